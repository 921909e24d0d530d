pub mod config;
pub mod errors;
pub mod fetch;
pub mod geojson;
pub mod line_codec;
pub mod loader;
pub mod notify;
pub mod overlay;
pub mod transform;

pub use config::{DataLayout, PipelineConfig};
pub use errors::{PipelineError, PipelineResult};
