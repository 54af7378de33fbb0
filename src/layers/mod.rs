//! Neural Network Layers
//!
//! ## Layers
//!
//! - **activation**: Element-wise activation functions and their registry
//! - **dense**: Fully connected layer
//!
//! ## Design Pattern
//!
//! Each trainable layer follows a consistent pattern:
//!
//! ```rust,ignore
//! impl Layer {
//!     pub fn forward(&self, x: &[f64], cache: &mut ForwardCache) -> Result<Vec<f64>> { }
//!     pub fn backward(&self, cache: &LayerCache, grad: &[f64]) -> Result<Gradients> { }
//! }
//! ```
//!
//! The forward pass records what backpropagation needs in a cache owned by
//! the caller, and the backward pass reads it back without touching the
//! layer. This keeps backpropagation explicit.

pub mod activation;
pub mod dense;

// Re-export main types for convenience
pub use activation::{activation_by_name, ActivationFunction, DEFAULT_LEAKY_ALPHA};
pub use dense::{random_init, DenseGradients, DenseLayer};
