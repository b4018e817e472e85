//! Error type for the Signal workspace.

use thiserror::Error;

/// Errors produced while building, running or configuring a signalling game.
///
/// Tensor-library failures (shape or device mismatches) are carried as
/// [`SignalError::Tensor`] with the original message intact, prefixed by the
/// operation that hit them.
///
/// # Example
///
/// ```
/// use signal_core::SignalError;
///
/// let err = SignalError::EmptyBatch { what: "receiver accuracy".to_string() };
/// assert!(err.to_string().contains("receiver accuracy"));
/// ```
#[derive(Debug, Error)]
pub enum SignalError {
    /// A tensor operation failed.
    #[error("tensor error: {message}")]
    Tensor { message: String },

    /// A metric was requested over zero elements.
    #[error("empty batch: cannot compute {what}")]
    EmptyBatch { what: String },

    /// Invalid hyperparameters or an inconsistent game wiring.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Dataset generation or batching failed.
    #[error("dataset error: {message}")]
    Dataset { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SignalError {
    /// Shorthand for a [`SignalError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
