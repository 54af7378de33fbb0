//! Forward Engine
//!
//! Drives an input vector through every layer of a [`Network`], producing the
//! output and the per-layer values backpropagation needs.
//!
//! The engine only borrows the network immutably. Each call builds its own
//! [`ForwardCache`], so any number of passes can run at once, which is what
//! [`ForwardEngine::predict_batch`] does with Rayon.
//!
//! ```rust
//! use synapses::{ActivationFunction, ForwardEngine, Network};
//!
//! let net = Network::new(2, &[(3, ActivationFunction::Tanh), (1, ActivationFunction::Sigmoid)], 7)?;
//! let (output, cache) = ForwardEngine::new(&net).run(&[0.5, -0.5])?;
//! assert_eq!(output.len(), 1);
//! assert_eq!(cache.len(), 2);
//! # Ok::<(), synapses::Error>(())
//! ```

use crate::error::Result;
use crate::network::Network;
use rayon::prelude::*;

/// Values recorded by one layer during a forward pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerCache {
    /// Input fed to the layer
    pub input: Vec<f64>,
    /// `z = W · x + b`
    pub pre_activation: Vec<f64>,
    /// `a = f(z)`
    pub output: Vec<f64>,
}

/// Per-pass record of every layer's values, in layer order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForwardCache {
    pub layers: Vec<LayerCache>,
}

impl ForwardCache {
    /// Empty cache with room for `n_layers` entries
    pub fn with_capacity(n_layers: usize) -> Self {
        Self {
            layers: Vec::with_capacity(n_layers),
        }
    }

    /// Record the next layer's values
    ///
    /// # Arguments
    ///
    /// * `entry` - Input, pre-activation and output of the layer that just ran
    ///
    /// Entries must be pushed in forward order; backpropagation walks them
    /// in reverse.
    pub fn push(&mut self, entry: LayerCache) {
        self.layers.push(entry);
    }

    /// Number of layers recorded
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Output of the last recorded layer
    pub fn output(&self) -> Option<&[f64]> {
        self.layers.last().map(|l| l.output.as_slice())
    }
}

/// Read-only driver for forward passes over one network
#[derive(Clone, Copy)]
pub struct ForwardEngine<'a> {
    network: &'a Network,
}

impl<'a> ForwardEngine<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self { network }
    }

    /// Run one input through the network, keeping every layer's values
    pub fn run(&self, input: &[f64]) -> Result<(Vec<f64>, ForwardCache)> {
        let layers = self.network.layers();
        let mut cache = ForwardCache::with_capacity(layers.len());
        let mut x = input.to_vec();
        for layer in layers {
            x = layer.forward(&x, &mut cache)?;
        }
        Ok((x, cache))
    }

    /// Output only; the cache is dropped
    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        self.run(input).map(|(output, _)| output)
    }

    /// Predict many inputs in parallel, preserving input order
    ///
    /// Fails with the first error in input order.
    pub fn predict_batch(&self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        inputs
            .par_iter()
            .map(|input| self.predict(input))
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::layers::ActivationFunction;

    fn net() -> Network {
        Network::new(
            3,
            &[
                (4, ActivationFunction::Tanh),
                (2, ActivationFunction::Sigmoid),
            ],
            11,
        )
        .unwrap()
    }

    #[test]
    fn test_run_records_every_layer() {
        let net = net();
        let (out, cache) = ForwardEngine::new(&net).run(&[0.1, 0.2, 0.3]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.layers[0].input, vec![0.1, 0.2, 0.3]);
        assert_eq!(cache.layers[1].input, cache.layers[0].output);
        assert_eq!(cache.output().unwrap(), out.as_slice());
    }

    #[test]
    fn test_predict_batch_matches_predict() {
        let net = net();
        let engine = ForwardEngine::new(&net);
        let inputs: Vec<Vec<f64>> = (0..64)
            .map(|i| vec![i as f64 * 0.1, -(i as f64) * 0.05, 1.0])
            .collect();

        let batch = engine.predict_batch(&inputs).unwrap();
        for (input, out) in inputs.iter().zip(&batch) {
            assert_eq!(&engine.predict(input).unwrap(), out);
        }
    }

    #[test]
    fn test_predict_batch_reports_bad_input() {
        let net = net();
        let inputs = vec![vec![1.0, 2.0, 3.0], vec![1.0]];
        let err = ForwardEngine::new(&net).predict_batch(&inputs);
        assert!(matches!(err, Err(Error::DimensionMismatch { .. })));
    }
}
