//! Error types for image operations.

use thiserror::Error;

/// Errors raised by image construction and filters.
#[derive(Error, Debug)]
pub enum ImageError {
    /// Two images that must share a grid do not.
    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// An operation received no images.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Voxel data could not be read or has the wrong length.
    #[error("Invalid image data: {0}")]
    InvalidData(String),

    /// A filter parameter is out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;

impl ImageError {
    /// Create a geometry mismatch error.
    pub fn geometry_mismatch(msg: impl Into<String>) -> Self {
        Self::GeometryMismatch(msg.into())
    }

    /// Create an empty input error.
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
