//! On-disk merged marker datasets.
//!
//! One GeoJSON file per marker id. The first successful fetch is written
//! verbatim; later fetches append their features. Every read-modify-write of
//! an artifact holds that marker's lock.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::errors::{FetchError, FetchResult, PipelineError, PipelineResult};
use crate::geojson;

pub const DATASET_EXTENSION: &str = "geojson";

/// What a merge did to the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No artifact existed; the document was stored as received.
    Created { features: usize },
    /// Features were appended to the existing artifact.
    Appended { added: usize, total: usize },
    /// The existing artifact was unreadable and has been replaced.
    Replaced { features: usize },
}

pub struct DatasetStore {
    dir: PathBuf,
    dedupe: bool,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DatasetStore {
    /// Opens the store, creating the directory when needed.
    pub async fn open(dir: impl Into<PathBuf>, dedupe: bool) -> PipelineResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::setup(dir.display(), e))?;
        Ok(Self {
            dir,
            dedupe,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, marker_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", marker_id, DATASET_EXTENSION))
    }

    fn lock_for(&self, marker_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(marker_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Merges a fetched document body into the marker's artifact.
    pub async fn merge(&self, marker_id: &str, body: &str) -> FetchResult<MergeOutcome> {
        let incoming = geojson::parse_document(body).map_err(|reason| {
            FetchError::MalformedDocument {
                source_name: marker_id.to_string(),
                reason,
            }
        })?;

        let lock = self.lock_for(marker_id);
        let _guard = lock.lock().await;

        let path = self.artifact_path(marker_id);
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, body).await?;
            let features = geojson::features(&incoming).map_or(0, Vec::len);
            debug!("Created dataset {} with {} features", path.display(), features);
            return Ok(MergeOutcome::Created { features });
        }

        let existing_text = tokio::fs::read_to_string(&path).await?;
        let mut existing = match geojson::parse_document(&existing_text) {
            Ok(doc) => doc,
            Err(reason) => {
                warn!(
                    "Existing dataset {} is unreadable ({}), replacing it",
                    path.display(),
                    reason
                );
                tokio::fs::write(&path, body).await?;
                let features = geojson::features(&incoming).map_or(0, Vec::len);
                return Ok(MergeOutcome::Replaced { features });
            }
        };

        let new_features = geojson::features(&incoming).cloned().unwrap_or_default();
        let existing_features =
            geojson::features_mut(&mut existing).ok_or_else(|| FetchError::MalformedDocument {
                source_name: path.display().to_string(),
                reason: "document root is not an object".to_string(),
            })?;

        let added = if self.dedupe {
            append_unique(existing_features, new_features)
        } else {
            let count = new_features.len();
            existing_features.extend(new_features);
            count
        };
        let total = existing_features.len();

        let serialized =
            serde_json::to_string_pretty(&existing).map_err(|e| FetchError::MalformedDocument {
                source_name: path.display().to_string(),
                reason: e.to_string(),
            })?;
        tokio::fs::write(&path, serialized).await?;
        debug!("Appended {} features to {} ({} total)", added, path.display(), total);

        Ok(MergeOutcome::Appended { added, total })
    }
}

fn feature_digest(feature: &Value) -> String {
    format!("{:x}", Sha256::digest(feature.to_string().as_bytes()))
}

/// Appends only features whose content is not already present.
fn append_unique(existing: &mut Vec<Value>, incoming: Vec<Value>) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(feature_digest).collect();
    let mut added = 0;
    for feature in incoming {
        if seen.insert(feature_digest(&feature)) {
            existing.push(feature);
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(points: &[[i64; 3]]) -> String {
        let features: Vec<Value> = points
            .iter()
            .map(|p| {
                json!({
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": p},
                    "properties": {"map": "spawn"}
                })
            })
            .collect();
        json!({"type": "FeatureCollection", "features": features}).to_string()
    }

    fn feature_count(path: &Path) -> usize {
        let text = std::fs::read_to_string(path).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        geojson::features(&doc).map_or(0, Vec::len)
    }

    #[tokio::test]
    async fn test_first_merge_stores_body_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path().join("data"), false).await.unwrap();
        let body = collection(&[[1, 2, 3]]);

        let outcome = store.merge("ore_iron", &body).await.unwrap();
        assert_eq!(outcome, MergeOutcome::Created { features: 1 });
        let stored = std::fs::read_to_string(store.artifact_path("ore_iron")).unwrap();
        assert_eq!(stored, body);
    }

    #[tokio::test]
    async fn test_refetch_appends_without_dedupe() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path(), false).await.unwrap();
        let body = collection(&[[1, 2, 3], [4, 5, 6]]);

        store.merge("ore_iron", &body).await.unwrap();
        let outcome = store.merge("ore_iron", &body).await.unwrap();

        assert_eq!(outcome, MergeOutcome::Appended { added: 2, total: 4 });
        assert_eq!(feature_count(&store.artifact_path("ore_iron")), 4);
    }

    #[tokio::test]
    async fn test_refetch_with_dedupe_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path(), true).await.unwrap();

        store.merge("ore_iron", &collection(&[[1, 2, 3]])).await.unwrap();
        let outcome = store
            .merge("ore_iron", &collection(&[[1, 2, 3], [7, 8, 9]]))
            .await
            .unwrap();

        assert_eq!(outcome, MergeOutcome::Appended { added: 1, total: 2 });
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path(), false).await.unwrap();

        let err = store.merge("ore_iron", "<html>").await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedDocument { .. }));
        assert!(!store.artifact_path("ore_iron").exists());
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path(), false).await.unwrap();
        std::fs::write(store.artifact_path("ore_iron"), "{\"features\": [").unwrap();

        let outcome = store
            .merge("ore_iron", &collection(&[[1, 2, 3]]))
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Replaced { features: 1 });
        assert_eq!(feature_count(&store.artifact_path("ore_iron")), 1);
    }

    #[tokio::test]
    async fn test_concurrent_merges_do_not_lose_features() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DatasetStore::open(dir.path(), false).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .merge("spawn_coin", &collection(&[[i, 0, 0], [i, 1, 0]]))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(feature_count(&store.artifact_path("spawn_coin")), 32);
    }
}
