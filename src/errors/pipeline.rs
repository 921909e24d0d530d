//! Run-level error types
//!
//! Only these reach the caller of a pipeline stage. Item-level failures are
//! counted in the stage summaries instead.

use thiserror::Error;

use super::{FetchError, OverlayError};

/// Errors that abort a pipeline stage
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required directory or file could not be created
    #[error("Setup failed: {0}")]
    Setup(String),

    /// An input the stage depends on does not exist
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// The configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// IO outside of a per-item boundary (e.g. writing the line file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn setup(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        PipelineError::Setup(format!("{}: {}", context, err))
    }

    /// Everything but a missing input stops the command with an error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::MissingInput(_))
    }
}
