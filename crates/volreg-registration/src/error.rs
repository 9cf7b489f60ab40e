//! Error types for registration operations.
//!
//! Degenerate overlap and numeric instability are recoverable inside the
//! engines; the other variants end a run.

use thiserror::Error;
use volreg_core::ImageError;

/// Main error type for registration operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Invalid configuration, such as an increasing step schedule.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Fixed and moving grids differ where they must agree.
    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// Too few samples of the fixed image map inside the moving image.
    #[error("Degenerate overlap: {valid} of {total} samples inside the moving image")]
    DegenerateOverlap { valid: usize, total: usize },

    /// A metric value, gradient or update is not finite.
    #[error("Numerical instability: {0}")]
    NumericInstability(String),

    /// An image operation failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The run was cancelled through its token.
    #[error("Registration cancelled")]
    Cancelled,
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a geometry mismatch error.
    pub fn geometry_mismatch(msg: impl Into<String>) -> Self {
        Self::GeometryMismatch(msg.into())
    }

    /// Create a numerical instability error.
    pub fn numeric_instability(msg: impl Into<String>) -> Self {
        Self::NumericInstability(msg.into())
    }

    /// Whether an engine may recover from this error and keep running.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DegenerateOverlap { .. } | Self::NumericInstability(_))
    }
}
