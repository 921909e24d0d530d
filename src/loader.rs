//! Reads the waypoint line file and hands the records to an overlay host.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::errors::{OverlayResult, PipelineError, PipelineResult};
use crate::line_codec::{self, ParsedWaypoint};
use crate::notify::Notifier;
use crate::overlay::{OverlayHost, WaypointId};

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub waypoints: Vec<ParsedWaypoint>,
    /// Non-blank lines that did not decode.
    pub skipped: usize,
}

/// Decodes every line of `path`. Lines that do not decode are logged and
/// skipped.
#[instrument(skip(notifier))]
pub fn load_waypoints(path: &Path, notifier: &dyn Notifier) -> PipelineResult<LoadReport> {
    if !path.is_file() {
        return Err(PipelineError::MissingInput(format!(
            "waypoints file {} does not exist",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let decoded = line_codec::decode_lines(&content);
    for (line_no, err) in &decoded.errors {
        warn!("{}:{}: {}", path.display(), line_no, err);
    }

    let report = LoadReport {
        skipped: decoded.errors.len(),
        waypoints: decoded.waypoints,
    };
    info!(
        "Loaded {} waypoints from {} ({} skipped)",
        report.waypoints.len(),
        path.display(),
        report.skipped
    );
    notifier.notify(
        "Waypoints Ready",
        &format!("Loaded {} waypoints", report.waypoints.len()),
    );
    Ok(report)
}

/// Creates one overlay entry per waypoint, owned by `owner`.
pub fn import_waypoints<H>(
    host: &mut H,
    owner: &str,
    waypoints: &[ParsedWaypoint],
) -> OverlayResult<Vec<WaypointId>>
where
    H: OverlayHost + ?Sized,
{
    waypoints
        .iter()
        .map(|waypoint| host.create_waypoint(owner, waypoint))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::overlay::{MemoryOverlay, DEFAULT_WAYPOINT_COLOR};

    #[test]
    fn test_load_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waypoints.txt");
        std::fs::write(
            &path,
            "/wp create 🪙Coin minecraft:overworld 1 2 3 aqua @p true\n\
             \n\
             /wp create broken\n\
             /wp create Old Forest minecraft:overworld 4 5 6 aqua @p true\n",
        )
        .unwrap();
        let notifier = RecordingNotifier::default();

        let report = load_waypoints(&path, &notifier).unwrap();

        assert_eq!(report.waypoints.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.waypoints[1].name, "Old Forest");
        assert_eq!(
            notifier.messages(),
            vec![("Waypoints Ready".to_string(), "Loaded 2 waypoints".to_string())]
        );
    }

    #[test]
    fn test_missing_file_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_waypoints(&dir.path().join("nope.txt"), &RecordingNotifier::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn test_import_creates_enabled_light_blue_entries() {
        let mut overlay = MemoryOverlay::new();
        let waypoints = vec![
            ParsedWaypoint::new("Coin", "minecraft:overworld", 1, 2, 3),
            ParsedWaypoint::new("Coin", "minecraft:overworld", 4, 5, 6),
        ];

        let ids = import_waypoints(&mut overlay, "waymark", &waypoints).unwrap();

        assert_eq!(ids.len(), 2);
        let entries = overlay.list_entries("waymark");
        assert!(entries
            .iter()
            .all(|e| e.enabled && e.color == DEFAULT_WAYPOINT_COLOR));
        assert_eq!((entries[1].x, entries[1].y, entries[1].z), (4, 5, 6));
    }
}
