//! Transform error types
//!
//! These cover one dataset file or one feature inside it. The transformer
//! logs them and moves on.

use thiserror::Error;

/// Errors raised while turning a merged dataset into waypoint lines
#[derive(Error, Debug)]
pub enum TransformError {
    /// The dataset file is not valid JSON
    #[error("Malformed dataset {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    /// A feature references a map that is not configured
    #[error("Unknown map: '{0}'")]
    UnknownMap(String),

    /// A coordinate is not numeric or does not fit a block position
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Reading the dataset file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
