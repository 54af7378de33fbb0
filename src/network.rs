//! Network
//!
//! An ordered, non-empty stack of [`DenseLayer`]s. The topology is fixed at
//! construction; training only changes weight and bias values.
//!
//! ## Construction
//!
//! ```rust
//! use synapses::{ActivationFunction, Network};
//!
//! // 2 inputs -> 2 hidden (sigmoid) -> 1 output (sigmoid)
//! let net = Network::new(
//!     2,
//!     &[(2, ActivationFunction::Sigmoid), (1, ActivationFunction::Sigmoid)],
//!     42,
//! )?;
//! assert_eq!(net.output_dim(), 1);
//! assert_eq!(net.num_parameters(), 9);
//! # Ok::<(), synapses::Error>(())
//! ```
//!
//! ## Initialization
//!
//! Layer `i` is seeded with `seed + 10000 * (i + 1)`, so the same seed always
//! yields the same weights.

use crate::error::{Error, Result};
use crate::forward::ForwardEngine;
use crate::layers::{activation_by_name, ActivationFunction, DenseLayer};

/// Shape of one layer, as exposed for validation and serialization
#[derive(Clone, Debug, PartialEq)]
pub struct LayerShape {
    pub in_dim: usize,
    pub out_dim: usize,
    pub activation: ActivationFunction,
}

/// Dense feed-forward network
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    input_dim: usize,
    pub(crate) layers: Vec<DenseLayer>,
}

impl Network {
    /// Build a network from the input size and `(out_dim, activation)` pairs
    pub fn new(
        input_dim: usize,
        layers: &[(usize, ActivationFunction)],
        seed: u64,
    ) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::invalid("input_dim", "must be > 0"));
        }
        if layers.is_empty() {
            return Err(Error::invalid("layers", "a network needs at least one layer"));
        }

        let mut built = Vec::with_capacity(layers.len());
        let mut in_dim = input_dim;
        for (i, &(out_dim, activation)) in layers.iter().enumerate() {
            let layer_seed = seed.wrapping_add(10_000 * (i as u64 + 1));
            built.push(DenseLayer::new(in_dim, out_dim, activation, layer_seed)?);
            in_dim = out_dim;
        }

        Self::from_layers(input_dim, built)
    }

    /// Assemble a network from prebuilt layers, checking that they chain
    pub fn from_layers(input_dim: usize, layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::invalid("layers", "a network needs at least one layer"));
        }

        let mut expected = input_dim;
        for (i, layer) in layers.iter().enumerate() {
            if layer.in_dim() != expected {
                return Err(Error::dimension(
                    format!("layer {i} input"),
                    expected,
                    layer.in_dim(),
                ));
            }
            expected = layer.out_dim();
        }

        Ok(Self { input_dim, layers })
    }

    /// Length of the input vector the first layer accepts
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Length of the vector [`Network::predict`] returns
    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(self.input_dim, DenseLayer::out_dim)
    }

    /// Layers in forward order
    ///
    /// Read-only; the topology is fixed once the network is built.
    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Dimensions and activation of every layer
    ///
    /// # Returns
    ///
    /// One [`LayerShape`] per layer, in forward order.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use synapses::{create_network, ActivationFunction};
    /// let net = create_network(4, &[(8, "leakyReLU"), (2, "sigmoid")], 1)?;
    /// let shape = net.shape();
    /// assert_eq!((shape[0].in_dim, shape[0].out_dim), (4, 8));
    /// assert_eq!(shape[1].activation, ActivationFunction::Sigmoid);
    /// # Ok::<(), synapses::Error>(())
    /// ```
    pub fn shape(&self) -> Vec<LayerShape> {
        self.layers
            .iter()
            .map(|l| LayerShape {
                in_dim: l.in_dim(),
                out_dim: l.out_dim(),
                activation: l.activation(),
            })
            .collect()
    }

    /// Total trainable values across all layers
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(DenseLayer::num_parameters).sum()
    }

    /// `true` when every weight and bias is finite
    pub fn is_finite(&self) -> bool {
        self.layers
            .iter()
            .all(|l| l.weight.is_finite() && l.bias.is_finite())
    }

    /// Final output for one input
    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        ForwardEngine::new(self).predict(input)
    }

    /// Outputs for many inputs, computed in parallel
    pub fn predict_batch(&self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        ForwardEngine::new(self).predict_batch(inputs)
    }
}

/// Build a network from activation identifiers such as `"sigmoid"` or
/// `"leakyReLU[0.05]"`
pub fn create_network(input_dim: usize, layers: &[(usize, &str)], seed: u64) -> Result<Network> {
    let resolved = layers
        .iter()
        .map(|&(out_dim, id)| activation_by_name(id).map(|f| (out_dim, f)))
        .collect::<Result<Vec<_>>>()?;
    Network::new(input_dim, &resolved, seed)
}

/// Final output of `network` for `input`
pub fn predict(network: &Network, input: &[f64]) -> Result<Vec<f64>> {
    network.predict(input)
}
