//! Line codec error types

use thiserror::Error;

/// Errors raised while decoding one waypoint line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    /// Too few tokens, or no dimension anchor could be found
    #[error("Malformed waypoint line: {0}")]
    MalformedLine(String),

    /// One of x, y, z is not a signed integer
    #[error("Invalid coordinate '{token}' in line: {line}")]
    InvalidCoordinate { token: String, line: String },
}
