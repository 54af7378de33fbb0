//! Loss Functions
//!
//! Scalar measures of prediction error for a single example, plus their
//! gradients with respect to the network output.
//!
//! ```text
//! mse:  L = (1/n) Σ (y - t)²                     ∂L/∂y = 2 (y - t) / n
//! bce:  L = -(1/n) Σ t ln y + (1 - t) ln(1 - y)  ∂L/∂y = (y - t) / (y (1 - y) n)
//! ```
//!
//! Binary cross-entropy clamps `y` to `[ε, 1 - ε]` so saturated sigmoid
//! outputs do not produce infinities.

use serde::{Deserialize, Serialize};

const BCE_EPSILON: f64 = 1e-12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFunction {
    #[default]
    MeanSquaredError,
    /// For outputs in `(0, 1)`, typically behind a sigmoid
    BinaryCrossEntropy,
}

impl LossFunction {
    /// Loss of one prediction against its target
    pub fn value(&self, output: &[f64], target: &[f64]) -> f64 {
        let n = output.len().max(1) as f64;
        match self {
            LossFunction::MeanSquaredError => {
                output
                    .iter()
                    .zip(target)
                    .map(|(y, t)| (y - t) * (y - t))
                    .sum::<f64>()
                    / n
            }
            LossFunction::BinaryCrossEntropy => {
                -output
                    .iter()
                    .zip(target)
                    .map(|(&y, &t)| {
                        let y = y.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);
                        t * y.ln() + (1.0 - t) * (1.0 - y).ln()
                    })
                    .sum::<f64>()
                    / n
            }
        }
    }

    /// Gradient of [`LossFunction::value`] with respect to `output`
    pub fn gradient(&self, output: &[f64], target: &[f64]) -> Vec<f64> {
        let n = output.len().max(1) as f64;
        match self {
            LossFunction::MeanSquaredError => output
                .iter()
                .zip(target)
                .map(|(y, t)| 2.0 * (y - t) / n)
                .collect(),
            LossFunction::BinaryCrossEntropy => output
                .iter()
                .zip(target)
                .map(|(&y, &t)| {
                    let y = y.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);
                    (y - t) / (y * (1.0 - y) * n)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse_loss() {
        let mse = LossFunction::MeanSquaredError;
        assert!(mse.value(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).abs() < 1e-12);
        // (1 + 4 + 9) / 3
        assert!((mse.value(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]) - 14.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradients_match_finite_difference() {
        let output = [0.2, 0.7, 0.4];
        let target = [0.0, 1.0, 1.0];
        let h = 1e-7;
        for loss in [LossFunction::MeanSquaredError, LossFunction::BinaryCrossEntropy] {
            let grad = loss.gradient(&output, &target);
            for i in 0..output.len() {
                let mut plus = output;
                plus[i] += h;
                let mut minus = output;
                minus[i] -= h;
                let numeric = (loss.value(&plus, &target) - loss.value(&minus, &target)) / (2.0 * h);
                assert!((grad[i] - numeric).abs() < 1e-5, "{loss:?} index {i}");
            }
        }
    }

    #[test]
    fn test_bce_is_finite_when_saturated() {
        let loss = LossFunction::BinaryCrossEntropy;
        assert!(loss.value(&[0.0, 1.0], &[1.0, 0.0]).is_finite());
        assert!(loss.gradient(&[0.0, 1.0], &[1.0, 0.0]).iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&LossFunction::BinaryCrossEntropy).unwrap();
        assert_eq!(json, "\"binary_cross_entropy\"");
    }
}
