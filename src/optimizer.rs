//! Gradient Descent Optimizer
//!
//! Plain gradient descent, optionally with classical momentum.
//!
//! ## Update Rules
//!
//! ```text
//! # plain
//! w = w - lr * g
//!
//! # momentum μ
//! v = μ * v - lr * g
//! w = w + v
//! ```
//!
//! Velocity buffers mirror the network's layer shapes exactly, one weight
//! matrix and one bias vector per layer, and only exist when momentum is
//! configured.
//!
//! ## Staged Updates
//!
//! [`OptimizerState::step`] computes every new weight and velocity before
//! touching the network. If any candidate value is NaN or infinite the whole
//! update is rejected and both the network and the velocities keep their
//! previous values.

use crate::error::{Error, Result};
use crate::gradients::{LayerGradients, NetworkGradients};
use crate::network::Network;
use crate::tensor::Tensor;
use rayon::prelude::*;

/// Optimizer state owned by a training run
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizerState {
    pub learning_rate: f64,
    pub momentum: Option<f64>,
    /// Present exactly when `momentum` is set
    pub velocities: Option<Vec<LayerGradients>>,
    /// Number of applied updates
    pub step: usize,
}

/// An update was discarded because it would have produced non-finite values
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedUpdate {
    /// First layer whose candidate weights were not finite
    pub layer: usize,
}

impl OptimizerState {
    /// Create optimizer state for `network`
    ///
    /// Velocities start at zero when momentum is set.
    pub fn new(network: &Network, learning_rate: f64, momentum: Option<f64>) -> Result<Self> {
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(Error::invalid(
                "learning_rate",
                format!("must be finite and > 0, got {learning_rate}"),
            ));
        }
        if let Some(mu) = momentum {
            if !mu.is_finite() || !(0.0..1.0).contains(&mu) {
                return Err(Error::invalid(
                    "momentum",
                    format!("must be in [0, 1), got {mu}"),
                ));
            }
        }

        let velocities = momentum.map(|_| NetworkGradients::zeros_like(network).layers);
        Ok(Self {
            learning_rate,
            momentum,
            velocities,
            step: 0,
        })
    }

    /// Apply one update to `network` from batch-averaged gradients
    pub fn step(
        &mut self,
        network: &mut Network,
        grads: &NetworkGradients,
    ) -> std::result::Result<(), RejectedUpdate> {
        let lr = self.learning_rate;
        let momentum = self.momentum;

        // Stage every layer's new parameters (and velocities) in parallel
        let staged: Vec<StagedLayer> = match &self.velocities {
            Some(velocities) => network
                .layers
                .par_iter()
                .zip(grads.layers.par_iter())
                .zip(velocities.par_iter())
                .map(|((layer, g), v)| {
                    let mu = momentum.unwrap_or(0.0);
                    let (weight, v_weight) = momentum_update(&layer.weight, &g.weight, &v.weight, lr, mu);
                    let (bias, v_bias) = momentum_update(&layer.bias, &g.bias, &v.bias, lr, mu);
                    StagedLayer {
                        weight,
                        bias,
                        velocity: Some(LayerGradients {
                            weight: v_weight,
                            bias: v_bias,
                        }),
                    }
                })
                .collect(),
            None => network
                .layers
                .par_iter()
                .zip(grads.layers.par_iter())
                .map(|(layer, g)| StagedLayer {
                    weight: plain_update(&layer.weight, &g.weight, lr),
                    bias: plain_update(&layer.bias, &g.bias, lr),
                    velocity: None,
                })
                .collect(),
        };

        if let Some(layer) = staged.iter().position(|s| !s.is_finite()) {
            return Err(RejectedUpdate { layer });
        }

        // Commit
        let mut new_velocities = Vec::with_capacity(staged.len());
        for (layer, s) in network.layers.iter_mut().zip(staged) {
            layer.weight = s.weight;
            layer.bias = s.bias;
            if let Some(v) = s.velocity {
                new_velocities.push(v);
            }
        }
        if self.velocities.is_some() {
            self.velocities = Some(new_velocities);
        }
        self.step += 1;
        Ok(())
    }
}

struct StagedLayer {
    weight: Tensor,
    bias: Tensor,
    velocity: Option<LayerGradients>,
}

impl StagedLayer {
    fn is_finite(&self) -> bool {
        self.weight.is_finite()
            && self.bias.is_finite()
            && self
                .velocity
                .as_ref()
                .map_or(true, |v| v.weight.is_finite() && v.bias.is_finite())
    }
}

fn plain_update(param: &Tensor, grad: &Tensor, lr: f64) -> Tensor {
    let mut next = param.clone();
    next.add_scaled(grad, -lr);
    next
}

fn momentum_update(param: &Tensor, grad: &Tensor, velocity: &Tensor, lr: f64, mu: f64) -> (Tensor, Tensor) {
    let v: Vec<f64> = velocity
        .data
        .iter()
        .zip(&grad.data)
        .map(|(&v, &g)| mu * v - lr * g)
        .collect();
    let w: Vec<f64> = param.data.iter().zip(&v).map(|(&w, &dv)| w + dv).collect();
    (
        Tensor::new(w, param.shape.clone()),
        Tensor::new(v, velocity.shape.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{ActivationFunction, DenseLayer};

    fn tiny_network() -> Network {
        let layer = DenseLayer::from_parts(
            Tensor::new(vec![1.0, 2.0], vec![1, 2]),
            Tensor::vector(vec![3.0]),
            ActivationFunction::Identity,
        )
        .unwrap();
        Network::from_layers(2, vec![layer]).unwrap()
    }

    fn uniform_grads(value: f64) -> NetworkGradients {
        NetworkGradients {
            layers: vec![LayerGradients {
                weight: Tensor::new(vec![value, value], vec![1, 2]),
                bias: Tensor::vector(vec![value]),
            }],
        }
    }

    #[test]
    fn test_plain_step() {
        let mut net = tiny_network();
        let mut opt = OptimizerState::new(&net, 1.0, None).unwrap();
        opt.step(&mut net, &uniform_grads(0.1)).unwrap();

        // w = w - lr * g
        let w = &net.layers()[0].weights().data;
        assert!((w[0] - 0.9).abs() < 1e-12);
        assert!((w[1] - 1.9).abs() < 1e-12);
        assert!((net.layers()[0].bias().data[0] - 2.9).abs() < 1e-12);
        assert!(opt.velocities.is_none());
        assert_eq!(opt.step, 1);
    }

    #[test]
    fn test_momentum_step() {
        let mut net = tiny_network();
        let mut opt = OptimizerState::new(&net, 0.1, Some(0.9)).unwrap();
        let g = uniform_grads(0.1);

        // v = -0.01, w = 1 - 0.01
        opt.step(&mut net, &g).unwrap();
        assert!((net.layers()[0].weights().data[0] - 0.99).abs() < 1e-12);

        // v = 0.9 * -0.01 - 0.01 = -0.019, w = 0.99 - 0.019
        opt.step(&mut net, &g).unwrap();
        assert!((net.layers()[0].weights().data[0] - 0.971).abs() < 1e-12);
        let v = &opt.velocities.as_ref().unwrap()[0];
        assert!((v.weight.data[0] - (-0.019)).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_non_finite_update() {
        let mut net = tiny_network();
        let before = net.clone();
        let mut opt = OptimizerState::new(&net, 0.5, Some(0.5)).unwrap();
        let velocities_before = opt.velocities.clone();

        let mut g = uniform_grads(0.1);
        g.layers[0].bias.data[0] = f64::NAN;
        assert_eq!(opt.step(&mut net, &g), Err(RejectedUpdate { layer: 0 }));
        assert_eq!(net, before);
        assert_eq!(opt.velocities, velocities_before);
        assert_eq!(opt.step, 0);
    }

    #[test]
    fn test_invalid_hyperparameters() {
        let net = tiny_network();
        assert!(OptimizerState::new(&net, 0.0, None).is_err());
        assert!(OptimizerState::new(&net, -0.1, None).is_err());
        assert!(OptimizerState::new(&net, f64::NAN, None).is_err());
        assert!(OptimizerState::new(&net, 0.1, Some(1.0)).is_err());
        assert!(OptimizerState::new(&net, 0.1, Some(-0.5)).is_err());
    }
}
