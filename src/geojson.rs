//! Minimal GeoJSON view used by the pipeline.
//!
//! Stored datasets are kept as raw `serde_json::Value` so that a first fetch
//! lands on disk verbatim. The typed structs below are only a reading lens
//! for the transform stage; anything they do not understand is ignored.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Geometry kinds the pipeline distinguishes. Everything else maps to
/// `Other` so that new kinds published upstream are skipped, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum GeometryType {
    Point,
    Polygon,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryType,
    #[serde(default)]
    pub coordinates: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoFeature {
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl GeoFeature {
    /// The `properties.map` attribute, or an empty string when absent.
    pub fn map_id(&self) -> &str {
        self.properties
            .as_ref()
            .and_then(|props| props.get("map"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry.as_ref().map(|g| g.kind)
    }

    /// Coordinates of a Point with exactly three values, otherwise `None`.
    pub fn point_coordinates(&self) -> Option<&[Value]> {
        let geometry = self.geometry.as_ref()?;
        if geometry.kind != GeometryType::Point {
            return None;
        }
        match geometry.coordinates.as_array() {
            Some(coords) if coords.len() == 3 => Some(coords.as_slice()),
            _ => None,
        }
    }
}

/// Parses a document and checks that it is a JSON object.
pub fn parse_document(text: &str) -> Result<Value, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("document root is not an object".to_string());
    }
    Ok(value)
}

/// The `features` array of a document, if it has one.
pub fn features(document: &Value) -> Option<&Vec<Value>> {
    document.get("features").and_then(Value::as_array)
}

/// Mutable `features` array, created empty when missing.
pub fn features_mut(document: &mut Value) -> Option<&mut Vec<Value>> {
    let object = document.as_object_mut()?;
    let entry = object
        .entry("features")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    entry.as_array_mut()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(value: Value) -> GeoFeature {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_point_with_three_coordinates() {
        let f = feature(json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [1, 2, 3]},
            "properties": {"map": "spawn"}
        }));
        assert_eq!(f.geometry_type(), Some(GeometryType::Point));
        assert_eq!(f.point_coordinates().map(|c| c.len()), Some(3));
        assert_eq!(f.map_id(), "spawn");
    }

    #[test]
    fn test_point_with_two_coordinates_is_unusable() {
        let f = feature(json!({
            "geometry": {"type": "Point", "coordinates": [1, 2]}
        }));
        assert!(f.point_coordinates().is_none());
        assert_eq!(f.map_id(), "");
    }

    #[test]
    fn test_unknown_geometry_type_is_other() {
        let f = feature(json!({
            "geometry": {"type": "MultiLineString", "coordinates": []}
        }));
        assert_eq!(f.geometry_type(), Some(GeometryType::Other));
        assert!(f.point_coordinates().is_none());
    }

    #[test]
    fn test_parse_document_rejects_non_objects() {
        assert!(parse_document("[1,2]").is_err());
        assert!(parse_document("{").is_err());
        assert!(parse_document(r#"{"type":"FeatureCollection"}"#).is_ok());
    }

    #[test]
    fn test_features_mut_creates_array() {
        let mut doc = json!({"type": "FeatureCollection"});
        features_mut(&mut doc).unwrap().push(json!({"a": 1}));
        assert_eq!(features(&doc).map(Vec::len), Some(1));
    }
}
