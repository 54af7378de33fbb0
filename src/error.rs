//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. Validation errors
//! are raised before anything is mutated, so a caller that sees an `Err` from
//! a constructor or from `train` can keep using the values it already had.

use thiserror::Error;

/// Errors produced by network construction, inference, training and
/// serialization.
#[derive(Debug, Error)]
pub enum Error {
    /// A vector or matrix had the wrong length for where it was used: an
    /// input fed to a layer, two layers that do not chain, or a descriptor
    /// whose topology disagrees with its payload.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// A hyperparameter or constructor argument was out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A serialized descriptor could not be decoded.
    #[error("format error: {0}")]
    Format(String),

    /// NaN or infinity appeared in a loss, gradient or weight during
    /// training. The network holds the weights of the last applied update.
    #[error("numerical instability at epoch {epoch}: {detail} (last good epoch: {last_good_epoch:?})")]
    NumericalInstability {
        epoch: usize,
        last_good_epoch: Option<usize>,
        detail: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn dimension(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Error::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_message() {
        let err = Error::dimension("layer 1 input", 3, 2);
        assert_eq!(
            err.to_string(),
            "dimension mismatch in layer 1 input: expected 3, got 2"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
