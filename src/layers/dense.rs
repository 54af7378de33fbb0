//! Dense Layer (Fully Connected)
//!
//! An affine transform followed by an element-wise activation:
//!
//! ```text
//! Input:  x [in_dim]
//! Weight: W [out_dim, in_dim]
//! Bias:   b [out_dim]
//! z = W · x + b
//! a = f(z)
//! ```
//!
//! ## Backward Pass
//!
//! With `g = ∂L/∂a` coming from the layer above:
//!
//! ```text
//! δ      = g ⊙ f'(z)
//! grad_W = δ ⊗ x
//! grad_b = δ
//! grad_x = Wᵀ · δ
//! ```
//!
//! The layer never stores the values of a pass. `forward` appends them to a
//! [`ForwardCache`] owned by the caller, and `backward` reads them back, so a
//! single layer can serve any number of concurrent passes.

use crate::error::{Error, Result};
use crate::forward::{ForwardCache, LayerCache};
use crate::gradients::LayerGradients;
use crate::layers::activation::ActivationFunction;
use crate::tensor::Tensor;

/// Helper function for random initialization
///
/// Uses a simple LCG (Linear Congruential Generator) for reproducible
/// initialization. Values are uniform in `[-scale, scale)`.
pub fn random_init(size: usize, seed: u64, scale: f64) -> Vec<f64> {
    let mut rng = seed;
    (0..size)
        .map(|_| {
            rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
            let val = ((rng / 65536) % 32768) as f64 / 32768.0;
            (val - 0.5) * 2.0 * scale
        })
        .collect()
}

/// Fully connected layer with its activation
#[derive(Clone, Debug, PartialEq)]
pub struct DenseLayer {
    pub(crate) weight: Tensor,
    pub(crate) bias: Tensor,
    pub(crate) activation: ActivationFunction,
}

impl DenseLayer {
    /// Create a new layer with Glorot-uniform weights and zero bias
    ///
    /// Weights are drawn from `[-s, s)` with `s = √(6 / (in_dim + out_dim))`,
    /// which keeps activations in the responsive range of sigmoid and tanh.
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        activation: ActivationFunction,
        seed: u64,
    ) -> Result<Self> {
        if in_dim == 0 {
            return Err(Error::invalid("in_dim", "layer input size must be > 0"));
        }
        if out_dim == 0 {
            return Err(Error::invalid("out_dim", "layer output size must be > 0"));
        }

        let scale = (6.0 / (in_dim + out_dim) as f64).sqrt();
        Ok(Self {
            weight: Tensor::new(
                random_init(in_dim * out_dim, seed, scale),
                vec![out_dim, in_dim],
            ),
            bias: Tensor::zeros(vec![out_dim]),
            activation,
        })
    }

    /// Assemble a layer from existing parameters
    ///
    /// `weight` must be `[out_dim, in_dim]` and `bias` `[out_dim]`.
    pub fn from_parts(weight: Tensor, bias: Tensor, activation: ActivationFunction) -> Result<Self> {
        if weight.shape.len() != 2 {
            return Err(Error::dimension("weight rank", 2, weight.shape.len()));
        }
        if bias.shape.len() != 1 {
            return Err(Error::dimension("bias rank", 1, bias.shape.len()));
        }
        if weight.data.len() != weight.rows() * weight.cols() {
            return Err(Error::dimension(
                "weight data length",
                weight.rows() * weight.cols(),
                weight.data.len(),
            ));
        }
        if bias.data.len() != bias.shape[0] {
            return Err(Error::dimension("bias data length", bias.shape[0], bias.data.len()));
        }
        if weight.rows() != bias.len() {
            return Err(Error::dimension("bias length", weight.rows(), bias.len()));
        }
        if weight.rows() == 0 || weight.cols() == 0 {
            return Err(Error::invalid("weight", "layer dimensions must be > 0"));
        }
        Ok(Self {
            weight,
            bias,
            activation,
        })
    }

    /// Length of the input vector this layer accepts
    ///
    /// # Example
    ///
    /// ```rust
    /// # use synapses::{ActivationFunction, DenseLayer};
    /// let layer = DenseLayer::new(3, 2, ActivationFunction::Tanh, 7)?;
    /// assert_eq!((layer.in_dim(), layer.out_dim()), (3, 2));
    /// assert_eq!(layer.num_parameters(), 3 * 2 + 2);
    /// # Ok::<(), synapses::Error>(())
    /// ```
    pub fn in_dim(&self) -> usize {
        self.weight.cols()
    }

    /// Number of neurons, which is the length of the output vector
    pub fn out_dim(&self) -> usize {
        self.weight.rows()
    }

    pub fn activation(&self) -> ActivationFunction {
        self.activation
    }

    /// Weight matrix `[out_dim, in_dim]`
    pub fn weights(&self) -> &Tensor {
        &self.weight
    }

    /// Bias vector `[out_dim]`, one entry per neuron
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Weights plus biases
    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    /// Forward pass
    ///
    /// Computes `a = f(W · x + b)`, records `(x, z, a)` in `cache` and
    /// returns `a`.
    pub fn forward(&self, input: &[f64], cache: &mut ForwardCache) -> Result<Vec<f64>> {
        if input.len() != self.in_dim() {
            return Err(Error::dimension(
                format!("layer {} input", cache.len()),
                self.in_dim(),
                input.len(),
            ));
        }

        let mut z = self.weight.matvec(input);
        for (zi, bi) in z.iter_mut().zip(&self.bias.data) {
            *zi += bi;
        }
        let a = self.activation.apply_all(&z);

        cache.push(LayerCache {
            input: input.to_vec(),
            pre_activation: z,
            output: a.clone(),
        });
        Ok(a)
    }

    /// Backward pass
    ///
    /// # Arguments
    ///
    /// * `cache` - Values recorded by the matching forward call
    /// * `grad_out` - Gradient of the loss with respect to this layer's output
    ///
    /// # Returns
    ///
    /// Parameter gradients and the gradient to hand to the previous layer.
    pub fn backward(&self, cache: &LayerCache, grad_out: &[f64]) -> Result<DenseGradients> {
        if grad_out.len() != self.out_dim() {
            return Err(Error::dimension(
                "upstream gradient",
                self.out_dim(),
                grad_out.len(),
            ));
        }
        if cache.input.len() != self.in_dim() || cache.output.len() != self.out_dim() {
            return Err(Error::dimension(
                "forward cache",
                self.in_dim(),
                cache.input.len(),
            ));
        }

        // δ = g ⊙ f'(z)
        let delta: Vec<f64> = grad_out
            .iter()
            .zip(cache.pre_activation.iter().zip(&cache.output))
            .map(|(&g, (&z, &a))| g * self.activation.derivative_cached(z, a))
            .collect();

        let weight = Tensor::outer(&delta, &cache.input);
        let input = self.weight.transpose_matvec(&delta);

        Ok(DenseGradients {
            params: LayerGradients {
                weight,
                bias: Tensor::vector(delta),
            },
            input,
        })
    }
}

/// Gradients produced by [`DenseLayer::backward`]
pub struct DenseGradients {
    pub params: LayerGradients,
    /// Gradient to pass to previous layer
    pub input: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_layer(activation: ActivationFunction) -> DenseLayer {
        DenseLayer::from_parts(
            Tensor::new(vec![0.5, -1.0, 0.25, 2.0, 0.0, -0.5], vec![2, 3]),
            Tensor::vector(vec![0.1, -0.2]),
            activation,
        )
        .unwrap()
    }

    #[test]
    fn test_random_init_is_deterministic_and_bounded() {
        let a = random_init(100, 7, 0.5);
        let b = random_init(100, 7, 0.5);
        assert_eq!(a, b);
        assert!(a.iter().all(|&v| (-0.5..0.5).contains(&v)));
        assert_ne!(a, random_init(100, 8, 0.5));
    }

    #[test]
    fn test_new_shapes() {
        let layer = DenseLayer::new(3, 2, ActivationFunction::Tanh, 42).unwrap();
        assert_eq!(layer.weights().shape, vec![2, 3]);
        assert_eq!(layer.bias().shape, vec![2]);
        assert_eq!(layer.num_parameters(), 8);
        assert!(layer.bias().data.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_new_rejects_zero_dims() {
        assert!(matches!(
            DenseLayer::new(0, 2, ActivationFunction::Identity, 1),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(DenseLayer::new(2, 0, ActivationFunction::Identity, 1).is_err());
    }

    #[test]
    fn test_from_parts_rejects_bad_bias() {
        let err = DenseLayer::from_parts(
            Tensor::zeros(vec![2, 3]),
            Tensor::zeros(vec![3]),
            ActivationFunction::Identity,
        );
        assert!(matches!(err, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_from_parts_rejects_data_shape_disagreement() {
        // Struct literals bypass the shape assert in Tensor::new
        let short_weight = Tensor {
            data: vec![0.1; 5],
            shape: vec![2, 3],
        };
        assert!(matches!(
            DenseLayer::from_parts(short_weight, Tensor::zeros(vec![2]), ActivationFunction::Sigmoid),
            Err(Error::DimensionMismatch { expected: 6, actual: 5, .. })
        ));

        let long_bias = Tensor {
            data: vec![0.0; 3],
            shape: vec![2],
        };
        assert!(matches!(
            DenseLayer::from_parts(Tensor::zeros(vec![2, 3]), long_bias, ActivationFunction::Sigmoid),
            Err(Error::DimensionMismatch { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn test_forward_identity() {
        let layer = fixed_layer(ActivationFunction::Identity);
        let mut cache = ForwardCache::default();
        let out = layer.forward(&[1.0, 2.0, 4.0], &mut cache).unwrap();

        // z0 = 0.5 - 2 + 1 + 0.1 = -0.4 ; z1 = 2 + 0 - 2 - 0.2 = -0.2
        assert!((out[0] - (-0.4)).abs() < 1e-12);
        assert!((out[1] - (-0.2)).abs() < 1e-12);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.layers[0].input, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_forward_rejects_wrong_input() {
        let layer = fixed_layer(ActivationFunction::Identity);
        let mut cache = ForwardCache::default();
        let err = layer.forward(&[1.0, 2.0], &mut cache);
        assert!(matches!(
            err,
            Err(Error::DimensionMismatch { expected: 3, actual: 2, .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        // L = sum(a), so grad_out = 1 for every output
        for activation in [
            ActivationFunction::Identity,
            ActivationFunction::Sigmoid,
            ActivationFunction::Tanh,
            ActivationFunction::LeakyReLU { alpha: 0.1 },
        ] {
            let layer = fixed_layer(activation);
            let x = [0.3, -0.7, 1.1];
            let mut cache = ForwardCache::default();
            layer.forward(&x, &mut cache).unwrap();
            let grads = layer.backward(&cache.layers[0], &[1.0, 1.0]).unwrap();

            let loss = |l: &DenseLayer, input: &[f64]| -> f64 {
                let mut c = ForwardCache::default();
                l.forward(input, &mut c).unwrap().iter().sum()
            };
            let h = 1e-6;

            for idx in 0..layer.weight.len() {
                let mut plus = layer.clone();
                plus.weight.data[idx] += h;
                let mut minus = layer.clone();
                minus.weight.data[idx] -= h;
                let numeric = (loss(&plus, &x) - loss(&minus, &x)) / (2.0 * h);
                assert!((grads.params.weight.data[idx] - numeric).abs() < 1e-6);
            }

            for i in 0..x.len() {
                let mut xp = x;
                xp[i] += h;
                let mut xm = x;
                xm[i] -= h;
                let numeric = (loss(&layer, &xp) - loss(&layer, &xm)) / (2.0 * h);
                assert!((grads.input[i] - numeric).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_backward_does_not_mutate() {
        let layer = fixed_layer(ActivationFunction::Sigmoid);
        let before = layer.clone();
        let mut cache = ForwardCache::default();
        layer.forward(&[1.0, 1.0, 1.0], &mut cache).unwrap();
        layer.backward(&cache.layers[0], &[0.5, -0.5]).unwrap();
        assert_eq!(layer, before);
    }

    #[test]
    fn test_backward_rejects_wrong_gradient() {
        let layer = fixed_layer(ActivationFunction::Sigmoid);
        let mut cache = ForwardCache::default();
        layer.forward(&[1.0, 1.0, 1.0], &mut cache).unwrap();
        assert!(layer.backward(&cache.layers[0], &[1.0]).is_err());
    }
}
