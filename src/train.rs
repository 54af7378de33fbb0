//! Training Engine
//!
//! Backpropagation with mini-batch gradient descent over a dataset of
//! [`TrainingExample`]s.
//!
//! ## Run Lifecycle
//!
//! ```text
//! Idle ──run()──▶ Running ──┬──▶ Converged          (epoch loss < loss_threshold)
//!                           ├──▶ MaxEpochsReached   (epoch limit hit first)
//!                           ├──▶ Cancelled          (stop requested, honored at a batch boundary)
//!                           └──▶ Aborted            (NaN/∞ values, or any error mid-run)
//! ```
//!
//! A run never ends in `Running`: once it has started, every error leaves
//! the engine `Aborted`.
//!
//! ## One Epoch
//!
//! 1. Optionally shuffle the example order (seeded, so runs are repeatable)
//! 2. Split into batches of `batch_size` (the last batch may be shorter)
//! 3. For every example of a batch, in parallel: forward pass, loss, and
//!    backward pass through all layers in reverse order
//! 4. Sum the per-example gradients in dataset order and divide by the batch
//!    length
//! 5. Optionally clip the gradient norm, then apply the optimizer update
//!
//! The update is the only write to the network and finishes before the next
//! batch's forward passes start.
//!
//! ## Example
//!
//! ```rust
//! use synapses::{ActivationFunction, Network, TrainingConfig, TrainingEngine, TrainingExample};
//!
//! let mut net = Network::new(1, &[(1, ActivationFunction::Identity)], 3)?;
//! let data: Vec<TrainingExample> = (0..8)
//!     .map(|i| {
//!         let x = i as f64 / 8.0;
//!         TrainingExample::new(vec![x], vec![2.0 * x + 1.0])
//!     })
//!     .collect();
//!
//! let config = TrainingConfig {
//!     epochs: 500,
//!     learning_rate: 0.5,
//!     batch_size: 8,
//!     ..TrainingConfig::default()
//! };
//! let report = TrainingEngine::new(config)?.run(&mut net, &data)?;
//! assert!(report.final_loss.unwrap() < 1e-3);
//! # Ok::<(), synapses::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::forward::ForwardEngine;
use crate::gradients::{clip_gradients, compute_grad_norm, NetworkGradients};
use crate::loss::LossFunction;
use crate::network::Network;
use crate::optimizer::OptimizerState;
use crate::training_logger::TrainingLogger;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One input vector with its expected output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
}

impl TrainingExample {
    /// Pair an input with its target
    ///
    /// Lengths are checked against the network when training starts.
    pub fn new(input: Vec<f64>, target: Vec<f64>) -> Self {
        Self { input, target }
    }
}

/// Training configuration
///
/// Missing fields take their [`Default`] values when loaded from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Maximum number of passes through the dataset
    pub epochs: usize,
    /// Step size of the gradient descent update
    pub learning_rate: f64,
    /// Examples per update
    pub batch_size: usize,
    /// Momentum coefficient in `[0, 1)`, plain gradient descent when `None`
    pub momentum: Option<f64>,
    /// Stop as converged once the epoch loss drops below this value
    pub loss_threshold: Option<f64>,
    pub loss: LossFunction,
    /// Reshuffle the example order every epoch
    pub shuffle: bool,
    /// Seed for shuffling
    pub seed: u64,
    /// Maximum L2 norm of the averaged batch gradient
    pub grad_clip: Option<f64>,
    /// Log metrics every N epochs (0 disables per-epoch logging)
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 1000,
            learning_rate: 0.1,
            batch_size: 1,
            momentum: None,
            loss_threshold: None,
            loss: LossFunction::MeanSquaredError,
            shuffle: true,
            seed: 0,
            grad_clip: None,
            log_every: 100,
        }
    }
}

impl TrainingConfig {
    /// Full-batch settings that solve XOR with a 2-2-1 sigmoid network
    pub fn xor() -> Self {
        Self {
            epochs: 5000,
            learning_rate: 2.0,
            batch_size: 4,
            shuffle: false,
            seed: 42,
            log_every: 500,
            ..Self::default()
        }
    }

    /// Check every hyperparameter, without touching any network
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::invalid("epochs", "must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid("batch_size", "must be > 0"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::invalid(
                "learning_rate",
                format!("must be finite and > 0, got {}", self.learning_rate),
            ));
        }
        if let Some(mu) = self.momentum {
            if !mu.is_finite() || !(0.0..1.0).contains(&mu) {
                return Err(Error::invalid("momentum", format!("must be in [0, 1), got {mu}")));
            }
        }
        if let Some(threshold) = self.loss_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(Error::invalid(
                    "loss_threshold",
                    format!("must be finite and >= 0, got {threshold}"),
                ));
            }
        }
        if let Some(clip) = self.grad_clip {
            if !clip.is_finite() || clip <= 0.0 {
                return Err(Error::invalid("grad_clip", format!("must be finite and > 0, got {clip}")));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    ///
    /// # Example
    ///
    /// ```rust
    /// # use synapses::TrainingConfig;
    /// let config = TrainingConfig::from_json_str(r#"{"epochs": 50, "batch_size": 4}"#)?;
    /// assert_eq!(config.epochs, 50);
    /// assert_eq!(config.learning_rate, TrainingConfig::default().learning_rate);
    /// # Ok::<(), synapses::Error>(())
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::invalid("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::invalid("config", e.to_string()))
    }
}

/// Where a training run stands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingState {
    Idle,
    Running,
    Converged,
    MaxEpochsReached,
    Aborted,
    Cancelled,
}

/// Cloneable handle for requesting a cooperative stop from another thread
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the run to stop at its next batch boundary
    ///
    /// Safe to call from any thread, any number of times. The engine clears
    /// the request once it has honored it, so a later run starts fresh.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use synapses::{TrainingConfig, TrainingEngine};
    /// let engine = TrainingEngine::new(TrainingConfig::default())?;
    /// let handle = engine.stop_handle();
    /// std::thread::spawn(move || handle.request_stop()).join().unwrap();
    /// assert!(engine.stop_handle().is_stop_requested());
    /// # Ok::<(), synapses::Error>(())
    /// ```
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop is pending
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Summary of a finished run
#[derive(Clone, Debug)]
pub struct TrainingReport {
    pub outcome: TrainingState,
    /// Completed epochs
    pub epochs_run: usize,
    /// Loss of the last completed epoch
    pub final_loss: Option<f64>,
    /// Loss of every completed epoch, in order
    pub loss_history: Vec<f64>,
    /// Optimizer state at the end of the run (velocities included)
    pub optimizer: OptimizerState,
}

/// A network together with the report of the run that trained it
#[derive(Clone, Debug)]
pub struct TrainedNetwork {
    pub network: Network,
    pub report: TrainingReport,
}

/// A failed [`train`] call
///
/// Carries the network back to the caller. After a numerical instability it
/// holds the weights of the last fully applied update; after a validation
/// error it is the network that was passed in.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TrainingFailure {
    pub error: Error,
    pub network: Network,
}

impl From<TrainingFailure> for Error {
    fn from(failure: TrainingFailure) -> Self {
        failure.error
    }
}

/// Iterates over a dataset in batches, optionally in shuffled order
///
/// Like a data loader: `next_batch` hands out consecutive batches and
/// returns `None` once the epoch is complete, resetting for the next one.
pub struct BatchLoader<'a> {
    examples: &'a [TrainingExample],
    order: Vec<usize>,
    batch_size: usize,
    position: usize,
}

impl<'a> BatchLoader<'a> {
    /// Loader over `examples` in their given order
    ///
    /// A `batch_size` of 0 is treated as 1.
    pub fn new(examples: &'a [TrainingExample], batch_size: usize) -> Self {
        Self {
            examples,
            order: (0..examples.len()).collect(),
            batch_size: batch_size.max(1),
            position: 0,
        }
    }

    /// Reorder the examples deterministically from `seed` and rewind
    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.order.shuffle(&mut rng);
        self.position = 0;
    }

    /// Next batch of the epoch, or `None` (and rewind) once it is exhausted
    pub fn next_batch(&mut self) -> Option<Vec<&'a TrainingExample>> {
        if self.position >= self.order.len() {
            self.position = 0;
            return None;
        }
        let end = (self.position + self.batch_size).min(self.order.len());
        let batch = self.order[self.position..end]
            .iter()
            .map(|&i| &self.examples[i])
            .collect();
        self.position = end;
        Some(batch)
    }

    /// Rewind to the first batch without reordering
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Updates per epoch; the last batch may be shorter
    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }
}

/// Drives training runs for one configuration
pub struct TrainingEngine {
    config: TrainingConfig,
    state: TrainingState,
    stop: StopHandle,
    logger: Option<TrainingLogger>,
}

impl TrainingEngine {
    /// Engine in state `Idle`
    ///
    /// # Arguments
    ///
    /// * `config` - Hyperparameters, checked with [`TrainingConfig::validate`]
    ///
    /// # Returns
    ///
    /// `Err(InvalidParameter)` for an invalid configuration.
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: TrainingState::Idle,
            stop: StopHandle::default(),
            logger: None,
        })
    }

    /// Attach a CSV metrics logger; it receives a row every `log_every` epochs
    pub fn with_logger(mut self, logger: TrainingLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Configuration every run of this engine uses
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Current lifecycle state
    ///
    /// `Idle` until the first run passes validation, then the terminal state
    /// of the most recent run.
    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Handle for stopping a run from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Train `network` on `dataset`
    ///
    /// On `Err(NumericalInstability)` the network keeps the weights of the
    /// last update that was fully applied. Validation errors leave it
    /// untouched and the engine in its previous state. Any other error after
    /// the run has started (a failing metrics logger, a gradient error)
    /// leaves the engine `Aborted`.
    pub fn run(&mut self, network: &mut Network, dataset: &[TrainingExample]) -> Result<TrainingReport> {
        validate_dataset(network, dataset)?;
        let mut optimizer =
            OptimizerState::new(network, self.config.learning_rate, self.config.momentum)?;
        let mut loader = BatchLoader::new(dataset, self.config.batch_size);

        self.state = TrainingState::Running;
        let start = Instant::now();
        info!(
            examples = dataset.len(),
            batches = loader.num_batches(),
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            learning_rate = self.config.learning_rate,
            momentum = ?self.config.momentum,
            "training started"
        );

        let mut loss_history = Vec::with_capacity(self.config.epochs);
        let outcome =
            match self.run_epochs(network, &mut loader, &mut optimizer, &mut loss_history) {
                Ok(outcome) => outcome,
                Err(err) => {
                    if self.state == TrainingState::Running {
                        self.state = TrainingState::Aborted;
                        warn!(error = %err, "training stopped by error");
                    }
                    return Err(err);
                }
            };

        self.state = outcome;
        let report = TrainingReport {
            outcome,
            epochs_run: loss_history.len(),
            final_loss: loss_history.last().copied(),
            loss_history,
            optimizer,
        };
        info!(
            outcome = ?report.outcome,
            epochs = report.epochs_run,
            final_loss = ?report.final_loss,
            elapsed_seconds = start.elapsed().as_secs_f64(),
            "training finished"
        );
        Ok(report)
    }

    /// Epoch loop; returns the terminal state of a run that did not fail
    fn run_epochs(
        &mut self,
        network: &mut Network,
        loader: &mut BatchLoader<'_>,
        optimizer: &mut OptimizerState,
        loss_history: &mut Vec<f64>,
    ) -> Result<TrainingState> {
        let examples = loader.examples.len() as f64;

        for epoch in 0..self.config.epochs {
            if self.config.shuffle {
                loader.shuffle(self.config.seed.wrapping_add(epoch as u64));
            } else {
                loader.reset();
            }

            let mut epoch_loss = 0.0;
            let mut grad_norm = 0.0;

            while let Some(batch) = loader.next_batch() {
                if self.stop.is_stop_requested() {
                    self.stop.clear();
                    warn!(epoch, "training cancelled at batch boundary");
                    return Ok(TrainingState::Cancelled);
                }

                let (batch_loss, mut grads) =
                    batch_gradients(network, &batch, self.config.loss)?;

                if !batch_loss.is_finite() || !grads.is_finite() {
                    return Err(self.abort(epoch, "non-finite loss or gradient"));
                }

                grad_norm = match self.config.grad_clip {
                    Some(max_norm) => {
                        let norm = clip_gradients(&mut grads, max_norm);
                        if norm > max_norm {
                            warn!(epoch, norm, max_norm, "gradient clipped");
                        }
                        norm
                    }
                    None => compute_grad_norm(&grads),
                };

                if let Err(rejected) = optimizer.step(network, &grads) {
                    return Err(self.abort(
                        epoch,
                        &format!("non-finite weights in layer {}", rejected.layer),
                    ));
                }

                epoch_loss += batch_loss;
            }

            let epoch_loss = epoch_loss / examples;
            loss_history.push(epoch_loss);

            if self.config.log_every > 0 && (epoch + 1) % self.config.log_every == 0 {
                debug!(epoch = epoch + 1, loss = epoch_loss, grad_norm, "epoch finished");
                if let Some(logger) = self.logger.as_mut() {
                    logger.log(epoch + 1, self.config.learning_rate, epoch_loss, grad_norm)?;
                }
            }

            if let Some(threshold) = self.config.loss_threshold {
                if epoch_loss < threshold {
                    info!(epoch = epoch + 1, loss = epoch_loss, threshold, "training converged");
                    return Ok(TrainingState::Converged);
                }
            }
        }

        Ok(TrainingState::MaxEpochsReached)
    }

    fn abort(&mut self, epoch: usize, detail: &str) -> Error {
        self.state = TrainingState::Aborted;
        let last_good_epoch = epoch.checked_sub(1);
        warn!(epoch, ?last_good_epoch, detail, "training aborted");
        Error::NumericalInstability {
            epoch,
            last_good_epoch,
            detail: detail.to_string(),
        }
    }
}

/// Train a network and hand it back with its report
///
/// The network is returned on failure too, inside [`TrainingFailure`].
///
/// # Example
///
/// ```rust
/// # use synapses::{create_network, train, Error, TrainingConfig, TrainingExample};
/// let net = create_network(1, &[(1, "identity")], 0)?;
/// let bad = vec![TrainingExample::new(vec![1.0, 2.0], vec![0.0])];
///
/// let failure = train(net.clone(), &bad, &TrainingConfig::default()).unwrap_err();
/// assert!(matches!(failure.error, Error::DimensionMismatch { .. }));
/// assert_eq!(failure.network, net);
/// # Ok::<(), synapses::Error>(())
/// ```
pub fn train(
    mut network: Network,
    dataset: &[TrainingExample],
    config: &TrainingConfig,
) -> std::result::Result<TrainedNetwork, TrainingFailure> {
    let outcome = TrainingEngine::new(config.clone())
        .and_then(|mut engine| engine.run(&mut network, dataset));
    match outcome {
        Ok(report) => Ok(TrainedNetwork { network, report }),
        Err(error) => Err(TrainingFailure { error, network }),
    }
}

fn validate_dataset(network: &Network, dataset: &[TrainingExample]) -> Result<()> {
    if dataset.is_empty() {
        return Err(Error::invalid("dataset", "must contain at least one example"));
    }
    for (i, example) in dataset.iter().enumerate() {
        if example.input.len() != network.input_dim() {
            return Err(Error::dimension(
                format!("example {i} input"),
                network.input_dim(),
                example.input.len(),
            ));
        }
        if example.target.len() != network.output_dim() {
            return Err(Error::dimension(
                format!("example {i} target"),
                network.output_dim(),
                example.target.len(),
            ));
        }
    }
    Ok(())
}

/// Summed loss and batch-averaged gradients for one batch
///
/// Examples are processed in parallel; the reduction runs in batch order so
/// the result does not depend on thread scheduling.
pub fn batch_gradients(
    network: &Network,
    batch: &[&TrainingExample],
    loss: LossFunction,
) -> Result<(f64, NetworkGradients)> {
    let per_example: Vec<Result<(f64, NetworkGradients)>> = batch
        .par_iter()
        .map(|example| example_gradients(network, example, loss))
        .collect();

    let mut total = NetworkGradients::zeros_like(network);
    let mut loss_sum = 0.0;
    for result in per_example {
        let (example_loss, grads) = result?;
        loss_sum += example_loss;
        total.accumulate(&grads);
    }
    total.scale(1.0 / batch.len().max(1) as f64);
    Ok((loss_sum, total))
}

/// Loss and parameter gradients for a single example
pub fn example_gradients(
    network: &Network,
    example: &TrainingExample,
    loss: LossFunction,
) -> Result<(f64, NetworkGradients)> {
    let (output, cache) = ForwardEngine::new(network).run(&example.input)?;
    let value = loss.value(&output, &example.target);
    let mut grad = loss.gradient(&output, &example.target);

    let mut layers = Vec::with_capacity(cache.len());
    for (layer, entry) in network.layers().iter().zip(&cache.layers).rev() {
        let grads = layer.backward(entry, &grad)?;
        grad = grads.input;
        layers.push(grads.params);
    }
    layers.reverse(); // Put back in forward order

    Ok((value, NetworkGradients { layers }))
}
