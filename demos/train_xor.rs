//! Train a 2-2-1 sigmoid network on XOR
//!
//! ## Usage
//!
//! ```bash
//! # Defaults: seed 42, learning rate 2.0, full batch, 5000 epochs
//! cargo run --release --example train_xor
//!
//! # Momentum, a CSV metrics log and a saved descriptor
//! RUST_LOG=synapses=debug cargo run --release --example train_xor -- \
//!     --learning-rate 0.5 --momentum 0.9 --epochs 2000 \
//!     --log xor_log.csv --save xor.bin
//!
//! # Load every setting from a JSON config
//! cargo run --release --example train_xor -- --config xor.json
//! ```

use clap::Parser;
use synapses::{
    create_network, root_mean_square_error, save_to_file, score, TrainingConfig, TrainingEngine,
    TrainingExample, TrainingLogger,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "train_xor", about = "Train a small network on XOR")]
struct Args {
    /// JSON training config; command-line flags override its values
    #[arg(long)]
    config: Option<String>,

    /// Hidden-layer activation (identity, sigmoid, tanh, leakyReLU[alpha])
    #[arg(long, default_value = "sigmoid")]
    hidden: String,

    /// Hidden-layer width
    #[arg(long, default_value_t = 2)]
    width: usize,

    /// Weight initialization seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    momentum: Option<f64>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop once the epoch loss drops below this value
    #[arg(long)]
    loss_threshold: Option<f64>,

    /// Write per-epoch metrics to this CSV file
    #[arg(long)]
    log: Option<String>,

    /// Save the trained network descriptor to this path
    #[arg(long)]
    save: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::xor(),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(lr) = args.learning_rate {
        config.learning_rate = lr;
    }
    if args.momentum.is_some() {
        config.momentum = args.momentum;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.loss_threshold.is_some() {
        config.loss_threshold = args.loss_threshold;
    }

    let dataset = vec![
        TrainingExample::new(vec![0.0, 0.0], vec![0.0]),
        TrainingExample::new(vec![0.0, 1.0], vec![1.0]),
        TrainingExample::new(vec![1.0, 0.0], vec![1.0]),
        TrainingExample::new(vec![1.0, 1.0], vec![0.0]),
    ];

    let mut network = create_network(2, &[(args.width, &args.hidden), (1, "sigmoid")], args.seed)?;
    println!("\n{}", "=".repeat(60));
    println!("  XOR: 2 -> {} ({}) -> 1 (sigmoid)", args.width, args.hidden);
    println!("  {} parameters", network.num_parameters());
    println!("{}\n", "=".repeat(60));

    let mut engine = TrainingEngine::new(config)?;
    if let Some(path) = &args.log {
        engine = engine.with_logger(TrainingLogger::new(path)?);
    }

    let report = engine.run(&mut network, &dataset)?;

    println!("\nOutcome: {:?} after {} epochs", report.outcome, report.epochs_run);
    if let Some(loss) = report.final_loss {
        println!("Final loss: {loss:.6}");
    }
    println!("RMSE: {:.4}", root_mean_square_error(&network, &dataset)?);
    println!("Accuracy: {:.0}%\n", 100.0 * score(&network, &dataset)?);

    for example in &dataset {
        let output = network.predict(&example.input)?;
        println!(
            "  {:?} -> {:.4} (target {})",
            example.input, output[0], example.target[0]
        );
    }

    if let Some(path) = &args.save {
        save_to_file(&network, path)?;
        println!("\nSaved network to {path}");
    }

    Ok(())
}
