//! Error types for image I/O.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure reading or writing an image file.
#[derive(Error, Debug)]
pub enum IoError {
    /// The file is missing, unreadable or not a usable 3-D volume.
    #[error("Failed to read {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// The file could not be written.
    #[error("Failed to write {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },
}

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, IoError>;

impl IoError {
    pub fn decode(path: &Path, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn encode(path: &Path, reason: impl ToString) -> Self {
        Self::Encode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Path of the file that failed.
    pub fn path(&self) -> &Path {
        match self {
            Self::Decode { path, .. } | Self::Encode { path, .. } => path,
        }
    }
}
