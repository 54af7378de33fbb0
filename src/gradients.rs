//! Gradient Utilities
//!
//! Containers for per-layer gradients plus the operations the training loop
//! performs on them: accumulation across a batch, averaging, norm
//! measurement, and clipping.
//!
//! ## Gradient Clipping
//!
//! ```text
//! norm = √(Σ gradient²)  // L2 norm over every weight and bias
//! if norm > max_norm:
//!     gradients *= (max_norm / norm)
//! ```
//!
//! All gradients are scaled by the same factor, preserving their relative
//! magnitudes while bounding the size of one update.

use crate::network::Network;
use crate::tensor::Tensor;
use rayon::prelude::*;

/// Gradient of the loss with respect to one layer's parameters
#[derive(Clone, Debug, PartialEq)]
pub struct LayerGradients {
    /// `[out_dim, in_dim]`, same layout as the weight matrix
    pub weight: Tensor,
    /// `[out_dim]`
    pub bias: Tensor,
}

impl LayerGradients {
    /// Zero gradients for an `out_dim x in_dim` layer
    pub fn zeros(out_dim: usize, in_dim: usize) -> Self {
        Self {
            weight: Tensor::zeros(vec![out_dim, in_dim]),
            bias: Tensor::zeros(vec![out_dim]),
        }
    }

    fn accumulate(&mut self, other: &LayerGradients) {
        self.weight.add_scaled(&other.weight, 1.0);
        self.bias.add_scaled(&other.bias, 1.0);
    }
}

/// Gradients for every layer of a network, in layer order
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkGradients {
    pub layers: Vec<LayerGradients>,
}

impl NetworkGradients {
    /// Zero gradients matching the network's shape
    pub fn zeros_like(network: &Network) -> Self {
        Self {
            layers: network
                .layers()
                .iter()
                .map(|l| LayerGradients::zeros(l.out_dim(), l.in_dim()))
                .collect(),
        }
    }

    /// Element-wise `self += other`
    /// Add `other` layer by layer
    pub fn accumulate(&mut self, other: &NetworkGradients) {
        for (acc, g) in self.layers.iter_mut().zip(&other.layers) {
            acc.accumulate(g);
        }
    }

    /// Multiply every gradient by `factor`, e.g. `1 / batch_len` to average
    pub fn scale(&mut self, factor: f64) {
        for g in &mut self.layers {
            g.weight.scale(factor);
            g.bias.scale(factor);
        }
    }

    pub fn is_finite(&self) -> bool {
        self.layers
            .iter()
            .all(|g| g.weight.is_finite() && g.bias.is_finite())
    }
}

/// Compute the L2 norm of all gradients
///
/// Per-layer sums of squares are computed in parallel and combined in layer
/// order.
pub fn compute_grad_norm(grads: &NetworkGradients) -> f64 {
    let per_layer: Vec<f64> = grads
        .layers
        .par_iter()
        .map(|g| g.weight.sum_squares() + g.bias.sum_squares())
        .collect();
    per_layer.iter().sum::<f64>().sqrt()
}

/// Clip gradients to a maximum L2 norm
///
/// Returns the norm measured before clipping.
pub fn clip_gradients(grads: &mut NetworkGradients, max_norm: f64) -> f64 {
    let norm = compute_grad_norm(grads);
    if norm > max_norm {
        grads.scale(max_norm / norm);
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grads(values: &[f64]) -> NetworkGradients {
        // One 1x2 layer: weight = values[0..2], bias = values[2]
        NetworkGradients {
            layers: vec![LayerGradients {
                weight: Tensor::new(values[..2].to_vec(), vec![1, 2]),
                bias: Tensor::vector(vec![values[2]]),
            }],
        }
    }

    #[test]
    fn test_grad_norm() {
        // √(3² + 4² + 0²) = 5
        assert!((compute_grad_norm(&grads(&[3.0, 4.0, 0.0])) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_scales_down() {
        let mut g = grads(&[3.0, 4.0, 0.0]);
        let before = clip_gradients(&mut g, 1.0);
        assert!((before - 5.0).abs() < 1e-12);
        assert!((compute_grad_norm(&g) - 1.0).abs() < 1e-12);
        assert!((g.layers[0].weight.data[0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_clip_leaves_small_gradients() {
        let mut g = grads(&[0.1, 0.2, 0.2]);
        let original = g.clone();
        clip_gradients(&mut g, 1.0);
        assert_eq!(g, original);
    }

    #[test]
    fn test_accumulate_and_scale() {
        let mut acc = grads(&[0.0, 0.0, 0.0]);
        acc.accumulate(&grads(&[1.0, 2.0, 3.0]));
        acc.accumulate(&grads(&[3.0, 2.0, 1.0]));
        acc.scale(0.5);
        assert_eq!(acc, grads(&[2.0, 2.0, 2.0]));
    }

    #[test]
    fn test_is_finite() {
        assert!(grads(&[1.0, 2.0, 3.0]).is_finite());
        assert!(!grads(&[1.0, f64::INFINITY, 3.0]).is_finite());
    }
}
