//! Transform stage: merged marker datasets -> waypoint lines.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, PipelineResult, TransformError, TransformResult};
use crate::fetch::store::DATASET_EXTENSION;
use crate::geojson::{self, GeoFeature, GeometryType};
use crate::line_codec::{self, ParsedWaypoint};
use crate::notify::Notifier;

/// Lines produced from one dataset file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileBatch {
    pub lines: Vec<String>,
    pub skipped_features: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    /// All lines, in dataset discovery order.
    pub lines: Vec<String>,
    pub files_scanned: usize,
    /// Files that could not be read or parsed.
    pub files_failed: usize,
    pub features_skipped: usize,
}

pub struct Transformer<'a> {
    config: &'a PipelineConfig,
    notifier: &'a dyn Notifier,
}

impl<'a> Transformer<'a> {
    pub fn new(config: &'a PipelineConfig, notifier: &'a dyn Notifier) -> Self {
        Self { config, notifier }
    }

    /// Transforms every dataset under `dataset_dir` and writes the lines to
    /// `output_file`, one per line.
    #[instrument(skip(self))]
    pub fn transform_to_file(
        &self,
        dataset_dir: &Path,
        output_file: &Path,
    ) -> PipelineResult<TransformReport> {
        if let Some(parent) = output_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::setup(parent.display(), e))?;
        }

        let report = self.transform(dataset_dir)?;
        let mut content = report.lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        std::fs::write(output_file, content)?;

        info!(
            "Created waypoints file with {} entries at: {}",
            report.lines.len(),
            output_file.display()
        );
        self.notifier.notify(
            "Waypoints Processed",
            &format!("Created {} waypoints", report.lines.len()),
        );
        Ok(report)
    }

    /// Transforms every dataset under `dataset_dir`. Files are processed in
    /// parallel; the result keeps discovery order.
    pub fn transform(&self, dataset_dir: &Path) -> PipelineResult<TransformReport> {
        let files = discover_datasets(dataset_dir)?;
        info!("Found {} GeoJson files to process", files.len());

        let batches: Vec<TransformResult<FileBatch>> = files
            .par_iter()
            .map(|path| self.transform_file(path))
            .collect();

        let mut report = TransformReport {
            files_scanned: files.len(),
            ..TransformReport::default()
        };
        for (path, batch) in files.iter().zip(batches) {
            match batch {
                Ok(batch) => {
                    report.features_skipped += batch.skipped_features;
                    report.lines.extend(batch.lines);
                }
                Err(err) => {
                    report.files_failed += 1;
                    warn!("Error processing file {}: {}", path.display(), err);
                }
            }
        }
        Ok(report)
    }

    pub fn transform_file(&self, path: &Path) -> TransformResult<FileBatch> {
        let content = std::fs::read_to_string(path)?;
        let document: Value =
            serde_json::from_str(&content).map_err(|e| TransformError::MalformedDocument {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let marker_id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();

        let batch = self.transform_document(marker_id, &document);
        debug!(
            "{}: {} lines, {} features skipped",
            path.display(),
            batch.lines.len(),
            batch.skipped_features
        );
        Ok(batch)
    }

    /// Emits one line per usable Point feature of a merged dataset.
    pub fn transform_document(&self, marker_id: &str, document: &Value) -> FileBatch {
        let mut batch = FileBatch::default();
        let features = match geojson::features(document) {
            Some(features) if !features.is_empty() => features,
            _ => return batch,
        };

        let base_id = self.config.strip_map_prefix(marker_id);
        let display_name = self.config.translate(base_id);

        for raw in features {
            match self.waypoint_for(display_name, raw) {
                Ok(Some(waypoint)) => batch.lines.push(line_codec::encode(&waypoint)),
                Ok(None) => batch.skipped_features += 1,
                Err(err) => {
                    warn!("{}: {}", marker_id, err);
                    batch.skipped_features += 1;
                }
            }
        }
        batch
    }

    /// `Ok(None)` for features that are silently ignored (non-points,
    /// wrong arity), `Err` for features worth a log line.
    fn waypoint_for(
        &self,
        display_name: &str,
        raw: &Value,
    ) -> TransformResult<Option<ParsedWaypoint>> {
        let feature: GeoFeature = match serde_json::from_value(raw.clone()) {
            Ok(feature) => feature,
            Err(err) => {
                debug!("Ignoring unreadable feature: {}", err);
                return Ok(None);
            }
        };

        match feature.geometry_type() {
            Some(GeometryType::Point) => {}
            // Polygons are reserved for area handling
            Some(GeometryType::Polygon) | Some(GeometryType::Other) | None => return Ok(None),
        }

        let coords = match feature.point_coordinates() {
            Some(coords) => coords,
            None => return Ok(None),
        };

        let map_id = feature.map_id();
        let dimension = self
            .config
            .dimension_for(map_id)
            .ok_or_else(|| TransformError::UnknownMap(map_id.to_string()))?;

        Ok(Some(ParsedWaypoint::new(
            display_name,
            dimension,
            block_coordinate(&coords[0])?,
            block_coordinate(&coords[1])?,
            block_coordinate(&coords[2])?,
        )))
    }
}

/// Every `.geojson` file under `dir`, sorted by path.
pub fn discover_datasets(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PipelineError::MissingInput(format!(
            "dataset directory {} does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("Skipping entry: {err}");
                continue;
            }
        };
        let is_dataset = entry.file_type().is_file()
            && entry.path().extension().and_then(|ext| ext.to_str()) == Some(DATASET_EXTENSION);
        if is_dataset {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Converts a JSON coordinate to a block position. Fractional values are
/// floored to the block that contains them.
fn block_coordinate(value: &Value) -> TransformResult<i32> {
    let invalid = || TransformError::InvalidCoordinate(value.to_string());
    if let Some(int) = value.as_i64() {
        return i32::try_from(int).map_err(|_| invalid());
    }
    if let Some(float) = value.as_f64() {
        let floored = float.floor();
        if floored.is_finite() && floored >= i32::MIN as f64 && floored <= i32::MAX as f64 {
            return Ok(floored as i32);
        }
        return Err(invalid());
    }
    if let Some(text) = value.as_str() {
        return text.trim().parse::<i32>().map_err(|_| invalid());
    }
    Err(invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapDefinition;
    use crate::notify::RecordingNotifier;
    use serde_json::json;

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.maps = vec![
            MapDefinition::new("spawn", "minecraft:overworld"),
            MapDefinition::new("kokoko", "minecraft:island_tropical"),
        ];
        config
    }

    fn point(coords: Value, map: &str) -> Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": coords},
            "properties": {"map": map}
        })
    }

    fn polygon() -> Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]},
            "properties": {"map": "spawn"}
        })
    }

    #[test]
    fn test_point_and_polygon_yield_one_line() {
        let config = config();
        let notifier = RecordingNotifier::default();
        let transformer = Transformer::new(&config, &notifier);
        let doc = json!({"type": "FeatureCollection", "features": [point(json!([1, 2, 3]), "spawn"), polygon()]});

        let batch = transformer.transform_document("ore_iron", &doc);
        assert_eq!(
            batch.lines,
            vec!["/wp create ⛏iron minecraft:overworld 1 2 3 aqua @p true".to_string()]
        );
        assert_eq!(batch.skipped_features, 1);
    }

    #[test]
    fn test_two_coordinate_point_yields_nothing() {
        let config = config();
        let notifier = RecordingNotifier::default();
        let transformer = Transformer::new(&config, &notifier);
        let doc = json!({"features": [point(json!([1, 2]), "spawn")]});

        assert!(transformer.transform_document("ore_iron", &doc).lines.is_empty());
    }

    #[test]
    fn test_unknown_or_missing_map_is_skipped() {
        let config = config();
        let notifier = RecordingNotifier::default();
        let transformer = Transformer::new(&config, &notifier);
        let no_props = json!({"geometry": {"type": "Point", "coordinates": [1, 2, 3]}});
        let doc = json!({
            "features": [
                point(json!([1, 2, 3]), "moon"),
                no_props,
                point(json!([4, 5, 6]), "kokoko")
            ]
        });

        let batch = transformer.transform_document("kokoko_coin", &doc);
        // "kokoko_coin" is looked up as "coin", which is untranslated
        assert_eq!(
            batch.lines,
            vec!["/wp create coin minecraft:island_tropical 4 5 6 aqua @p true".to_string()]
        );
        assert_eq!(batch.skipped_features, 2);
    }

    #[test]
    fn test_missing_or_empty_features_yield_nothing() {
        let config = config();
        let notifier = RecordingNotifier::default();
        let transformer = Transformer::new(&config, &notifier);

        assert_eq!(
            transformer.transform_document("x", &json!({"type": "FeatureCollection"})),
            FileBatch::default()
        );
        assert_eq!(
            transformer.transform_document("x", &json!({"features": []})),
            FileBatch::default()
        );
    }

    #[test]
    fn test_untranslated_marker_keeps_base_id() {
        let config = config();
        let notifier = RecordingNotifier::default();
        let transformer = Transformer::new(&config, &notifier);
        let doc = json!({"features": [point(json!([1, 2, 3]), "spawn")]});

        let batch = transformer.transform_document("spawn_mystery_rock", &doc);
        assert_eq!(
            batch.lines,
            vec!["/wp create mystery_rock minecraft:overworld 1 2 3 aqua @p true".to_string()]
        );
    }

    #[test]
    fn test_block_coordinate_conversion() {
        assert_eq!(block_coordinate(&json!(12)).unwrap(), 12);
        assert_eq!(block_coordinate(&json!(-0.5)).unwrap(), -1);
        assert_eq!(block_coordinate(&json!(7.9)).unwrap(), 7);
        assert_eq!(block_coordinate(&json!("42")).unwrap(), 42);
        assert!(block_coordinate(&json!(1e12)).is_err());
        assert!(block_coordinate(&json!(null)).is_err());
    }

    #[test]
    fn test_transform_to_file_keeps_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("geojson_data");
        std::fs::create_dir_all(&data).unwrap();
        for (name, x) in [("b_marker", 2), ("a_marker", 1), ("c_marker", 3)] {
            let doc = json!({"features": [point(json!([x, 0, 0]), "spawn")]});
            std::fs::write(data.join(format!("{}.geojson", name)), doc.to_string()).unwrap();
        }
        std::fs::write(data.join("broken.geojson"), "{").unwrap();
        std::fs::write(data.join("notes.txt"), "ignored").unwrap();

        let config = config();
        let notifier = RecordingNotifier::default();
        let transformer = Transformer::new(&config, &notifier);
        let output = dir.path().join("out").join("waypoints.txt");
        let report = transformer.transform_to_file(&data, &output).unwrap();

        assert_eq!(report.files_scanned, 4);
        assert_eq!(report.files_failed, 1);
        let names: Vec<_> = report
            .lines
            .iter()
            .map(|line| line.split(' ').nth(2).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a_marker", "b_marker", "c_marker"]);

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.lines().count(), 3);
        assert_eq!(
            notifier.messages(),
            vec![("Waypoints Processed".to_string(), "Created 3 waypoints".to_string())]
        );
    }

    #[test]
    fn test_missing_dataset_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_datasets(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }
}
