//! Training Logger and Utilities
//!
//! This module provides utilities for tracking training metrics. It includes
//! a CSV logger for detailed tracking and helpers for splitting a dataset and
//! measuring loss over it.
//!
//! ## Components
//!
//! - **TrainingLogger**: Logs metrics to CSV and as `tracing` events
//! - **train_val_split**: Splits examples into training and validation sets
//! - **evaluate**: Mean loss of a network over a dataset
//!
//! ## Example
//!
//! ```rust,no_run
//! use synapses::TrainingLogger;
//!
//! let mut logger = TrainingLogger::new("training_log.csv")?;
//! logger.log(100, 0.5, 0.031, 0.42)?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! ## CSV Format
//!
//! - `epoch`: Completed epoch number (1-based)
//! - `elapsed_seconds`: Time since the logger was created
//! - `learning_rate`: Step size in use
//! - `loss`: Mean per-example loss of the epoch
//! - `grad_norm`: L2 norm of the last batch gradient (before clipping)

use crate::error::{Error, Result};
use crate::forward::ForwardEngine;
use crate::loss::LossFunction;
use crate::network::Network;
use crate::train::TrainingExample;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Training logger for tracking metrics over time
///
/// Every row is flushed immediately, so the file stays readable if the
/// process dies mid-run.
///
/// # Fields
///
/// - `log_file`: CSV destination
/// - `start_time`: When the logger was created (for elapsed time)
/// - `last_log_time`: Last log timestamp (for per-row timing)
pub struct TrainingLogger {
    log_file: Box<dyn Write + Send>,
    start_time: Instant,
    last_log_time: Instant,
}

impl TrainingLogger {
    /// Create a CSV file and write its header
    ///
    /// # Arguments
    ///
    /// * `log_path` - Path of the CSV file to create (truncated if present)
    pub fn new<P: AsRef<Path>>(log_path: P) -> std::io::Result<Self> {
        Self::from_writer(BufWriter::new(File::create(log_path)?))
    }

    /// Log into any writer, e.g. a socket or an in-memory buffer
    ///
    /// The CSV header is written and flushed immediately.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> std::io::Result<Self> {
        let mut log_file: Box<dyn Write + Send> = Box::new(writer);
        writeln!(log_file, "epoch,elapsed_seconds,learning_rate,loss,grad_norm")?;
        log_file.flush()?;

        let now = Instant::now();
        Ok(Self {
            log_file,
            start_time: now,
            last_log_time: now,
        })
    }

    /// Log one epoch
    ///
    /// # Arguments
    ///
    /// * `epoch` - Completed epoch number (1-based)
    /// * `learning_rate` - Step size in use
    /// * `loss` - Mean per-example loss of the epoch
    /// * `grad_norm` - L2 norm of the last batch gradient
    pub fn log(
        &mut self,
        epoch: usize,
        learning_rate: f64,
        loss: f64,
        grad_norm: f64,
    ) -> std::io::Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f64();

        writeln!(
            self.log_file,
            "{},{:.3},{:.6},{:.8},{:.6}",
            epoch, elapsed, learning_rate, loss, grad_norm
        )?;
        self.log_file.flush()?;

        let since_last = self.last_log_time.elapsed().as_secs_f64();
        info!(
            epoch,
            elapsed_seconds = elapsed,
            since_last_seconds = since_last,
            learning_rate,
            loss,
            grad_norm,
            "epoch metrics"
        );

        self.last_log_time = Instant::now();
        Ok(())
    }
}

/// Split examples into training and validation sets
///
/// The validation set is taken from the end of the slice.
///
/// ```rust
/// # use synapses::{train_val_split, TrainingExample};
/// let data: Vec<TrainingExample> = (0..10)
///     .map(|i| TrainingExample::new(vec![i as f64], vec![0.0]))
///     .collect();
/// let (train, val) = train_val_split(&data, 0.2);
/// assert_eq!(train.len(), 8);
/// assert_eq!(val.len(), 2);
/// ```
pub fn train_val_split(
    examples: &[TrainingExample],
    val_fraction: f64,
) -> (&[TrainingExample], &[TrainingExample]) {
    let fraction = val_fraction.clamp(0.0, 1.0);
    let split_idx = ((examples.len() as f64) * (1.0 - fraction)).round() as usize;
    examples.split_at(split_idx.min(examples.len()))
}

/// Mean per-example loss of `network` over `dataset`
///
/// Returns `0.0` for an empty dataset. Inputs and targets must match the
/// network's dimensions.
pub fn evaluate(network: &Network, dataset: &[TrainingExample], loss: LossFunction) -> Result<f64> {
    if dataset.is_empty() {
        return Ok(0.0);
    }
    if let Some((i, example)) = dataset
        .iter()
        .enumerate()
        .find(|(_, e)| e.target.len() != network.output_dim())
    {
        return Err(Error::dimension(
            format!("example {i} target"),
            network.output_dim(),
            example.target.len(),
        ));
    }
    let engine = ForwardEngine::new(network);
    let losses = dataset
        .par_iter()
        .map(|example| {
            engine
                .predict(&example.input)
                .map(|output| loss.value(&output, &example.target))
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(losses.iter().sum::<f64>() / dataset.len() as f64)
}
