//! Synapses: Dense Feed-Forward Neural Networks
//!
//! Multi-layer perceptrons with per-layer activation functions, forward
//! inference, and training by backpropagation with mini-batch gradient
//! descent.
//!
//! # Modules
//!
//! - [`layers`] - Activation functions and the dense layer
//! - [`network`] - Layer stack with fixed topology
//! - [`forward`] - Forward passes and their caches
//! - [`train`] - Training engine, configuration and run lifecycle
//! - [`optimizer`] - Gradient descent with optional momentum
//! - [`serializer`] - Versioned binary descriptor and JSON export
//! - [`stats`] - RMSE and classification score over a dataset
//!
//! # Example
//!
//! ```rust
//! use synapses::{create_network, deserialize, predict, serialize, train, TrainingConfig, TrainingExample};
//!
//! let xor = vec![
//!     TrainingExample::new(vec![0.0, 0.0], vec![0.0]),
//!     TrainingExample::new(vec![0.0, 1.0], vec![1.0]),
//!     TrainingExample::new(vec![1.0, 0.0], vec![1.0]),
//!     TrainingExample::new(vec![1.0, 1.0], vec![0.0]),
//! ];
//!
//! let net = create_network(2, &[(2, "sigmoid"), (1, "sigmoid")], 42)?;
//! let trained = train(net, &xor, &TrainingConfig::xor())?;
//! assert!(trained.report.final_loss.unwrap() < 0.05);
//!
//! let restored = deserialize(&serialize(&trained.network)?)?;
//! assert_eq!(predict(&restored, &[1.0, 0.0])?, predict(&trained.network, &[1.0, 0.0])?);
//! # Ok::<(), synapses::Error>(())
//! ```

pub mod error;
pub mod forward;
pub mod gradients;
pub mod layers;
pub mod loss;
pub mod network;
pub mod optimizer;
pub mod serializer;
pub mod stats;
pub mod tensor;
pub mod train;
pub mod training_logger;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use forward::{ForwardCache, ForwardEngine, LayerCache};
pub use gradients::{clip_gradients, compute_grad_norm, LayerGradients, NetworkGradients};
pub use layers::{activation_by_name, ActivationFunction, DenseLayer, DEFAULT_LEAKY_ALPHA};
pub use loss::LossFunction;
pub use network::{create_network, predict, LayerShape, Network};
pub use optimizer::OptimizerState;
pub use serializer::{deserialize, load_from_file, save_to_file, serialize};
pub use stats::{root_mean_square_error, score};
pub use tensor::Tensor;
pub use train::{
    train, StopHandle, TrainedNetwork, TrainingConfig, TrainingEngine, TrainingExample,
    TrainingFailure, TrainingReport, TrainingState,
};
pub use training_logger::{evaluate, train_val_split, TrainingLogger};
