//! Dataset statistics for a trained network

use crate::error::{Error, Result};
use crate::network::Network;
use crate::train::TrainingExample;

/// Root-mean-square error over every output of every example
///
/// ```text
/// rmse = √( Σ_examples Σ_outputs (y - t)² / (examples · outputs) )
/// ```
pub fn root_mean_square_error(network: &Network, dataset: &[TrainingExample]) -> Result<f64> {
    if dataset.is_empty() {
        return Err(Error::invalid("dataset", "must contain at least one example"));
    }
    let outputs = network.predict_batch(&inputs(dataset))?;

    let mut sum = 0.0;
    let mut count = 0usize;
    for (output, example) in outputs.iter().zip(dataset) {
        check_target(network, example)?;
        sum += output
            .iter()
            .zip(&example.target)
            .map(|(y, t)| (y - t) * (y - t))
            .sum::<f64>();
        count += output.len();
    }
    Ok((sum / count as f64).sqrt())
}

/// Fraction of examples classified correctly
///
/// Multi-output networks compare the arg-max of output and target.
/// Single-output networks threshold both at 0.5.
pub fn score(network: &Network, dataset: &[TrainingExample]) -> Result<f64> {
    if dataset.is_empty() {
        return Err(Error::invalid("dataset", "must contain at least one example"));
    }
    let outputs = network.predict_batch(&inputs(dataset))?;

    let mut correct = 0usize;
    for (output, example) in outputs.iter().zip(dataset) {
        check_target(network, example)?;
        let hit = if output.len() == 1 {
            (output[0] >= 0.5) == (example.target[0] >= 0.5)
        } else {
            argmax(output) == argmax(&example.target)
        };
        if hit {
            correct += 1;
        }
    }
    Ok(correct as f64 / dataset.len() as f64)
}

fn inputs(dataset: &[TrainingExample]) -> Vec<Vec<f64>> {
    dataset.iter().map(|e| e.input.clone()).collect()
}

fn check_target(network: &Network, example: &TrainingExample) -> Result<()> {
    if example.target.len() != network.output_dim() {
        return Err(Error::dimension(
            "target",
            network.output_dim(),
            example.target.len(),
        ));
    }
    Ok(())
}

/// Index of the largest value (first on ties)
fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best), (i, &v)| {
            if v > best {
                (i, v)
            } else {
                (best_i, best)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{ActivationFunction, DenseLayer};
    use crate::tensor::Tensor;

    /// Identity network copying a 2-vector through
    fn passthrough() -> Network {
        let layer = DenseLayer::from_parts(
            Tensor::new(vec![1.0, 0.0, 0.0, 1.0], vec![2, 2]),
            Tensor::vector(vec![0.0, 0.0]),
            ActivationFunction::Identity,
        )
        .unwrap();
        Network::from_layers(2, vec![layer]).unwrap()
    }

    #[test]
    fn test_rmse() {
        let net = passthrough();
        let exact = vec![TrainingExample::new(vec![1.0, 2.0], vec![1.0, 2.0])];
        assert_eq!(root_mean_square_error(&net, &exact).unwrap(), 0.0);

        // errors 1 and 3 → √((1 + 9) / 2)
        let off = vec![TrainingExample::new(vec![1.0, 2.0], vec![0.0, 5.0])];
        assert!((root_mean_square_error(&net, &off).unwrap() - 5.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_score_argmax() {
        let net = passthrough();
        let data = vec![
            TrainingExample::new(vec![0.9, 0.1], vec![1.0, 0.0]),
            TrainingExample::new(vec![0.2, 0.8], vec![0.0, 1.0]),
            TrainingExample::new(vec![0.6, 0.4], vec![0.0, 1.0]),
            TrainingExample::new(vec![0.3, 0.7], vec![1.0, 0.0]),
        ];
        assert_eq!(score(&net, &data).unwrap(), 0.5);
    }

    #[test]
    fn test_score_single_output_threshold() {
        let layer = DenseLayer::from_parts(
            Tensor::new(vec![1.0], vec![1, 1]),
            Tensor::vector(vec![0.0]),
            ActivationFunction::Identity,
        )
        .unwrap();
        let net = Network::from_layers(1, vec![layer]).unwrap();
        let data = vec![
            TrainingExample::new(vec![0.7], vec![1.0]),
            TrainingExample::new(vec![0.2], vec![0.0]),
            TrainingExample::new(vec![0.4], vec![1.0]),
        ];
        assert!((score(&net, &data).unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_datasets() {
        let net = passthrough();
        assert!(matches!(score(&net, &[]), Err(Error::InvalidParameter { .. })));
        let wrong_target = vec![TrainingExample::new(vec![1.0, 2.0], vec![1.0])];
        assert!(matches!(
            root_mean_square_error(&net, &wrong_target),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
