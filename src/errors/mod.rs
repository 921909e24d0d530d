//! Domain-specific error types for waymark
//!
//! Every stage of the pipeline contains its failures at the item boundary
//! (one category attempt, one dataset file, one feature, one line). Only
//! setup failures travel all the way up to the caller.
//!
//! # Error Categories
//!
//! - **FetchError**: a single category attempt against the remote service
//! - **TransformError**: a dataset file or a single feature inside it
//! - **LineError**: decoding one waypoint line
//! - **OverlayError**: operations against the overlay host
//! - **PipelineError**: run-level failures (setup, missing input, config)
//!
//! # Examples
//!
//! ```rust
//! use waymark::errors::{LineError, PipelineError};
//!
//! let err = LineError::MalformedLine("/wp create".to_string());
//! assert!(!err.to_string().is_empty());
//!
//! let err = PipelineError::Setup("cannot create geojson_data".to_string());
//! assert!(err.is_fatal());
//! ```

pub mod fetch;
pub mod line;
pub mod overlay;
pub mod pipeline;
pub mod transform;

pub use fetch::FetchError;
pub use line::LineError;
pub use overlay::OverlayError;
pub use pipeline::PipelineError;
pub use transform::TransformError;

/// Result type alias for fetch attempts
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type alias for dataset transformation
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type alias for line decoding
pub type LineResult<T> = Result<T, LineError>;

/// Result type alias for overlay operations
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Result type alias for whole pipeline runs
pub type PipelineResult<T> = Result<T, PipelineError>;
