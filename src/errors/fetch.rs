//! Fetch error types
//!
//! A `FetchError` describes why one category attempt for a
//! (map, marker) pair did not produce a dataset. None of these abort a run.

use thiserror::Error;

/// Errors raised while fetching or merging a single remote document
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport level failure (DNS, connect, timeout, body read)
    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// The remote answered with anything but 200
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Body or stored artifact is not a usable GeoJSON document
    #[error("Malformed document {source_name}: {reason}")]
    MalformedDocument { source_name: String, reason: String },

    /// Reading or writing a dataset artifact failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

impl FetchError {
    /// True when the category should be treated as "not published here"
    /// rather than as a transport problem.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { .. })
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, FetchError::Network { .. })
    }
}
