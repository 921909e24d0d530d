//! Overlay host error types

use thiserror::Error;

use crate::overlay::{GroupId, WaypointId};

/// Errors raised by an overlay host
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Waypoint not known to the host
    #[error("Waypoint {0} not found")]
    UnknownEntry(WaypointId),

    /// Group not known to the host
    #[error("Group {0} not found")]
    UnknownGroup(GroupId),

    /// Persisting the overlay store failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The overlay store on disk could not be read back
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
