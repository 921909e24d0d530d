//! Fetch stage: pull every (map, marker) dataset from the remote service and
//! merge same-marker results into one artifact per marker.

pub mod http;
pub mod store;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::{FetchSettings, MapDefinition, PipelineConfig};
use crate::errors::{FetchError, FetchResult, PipelineResult};
use crate::notify::Notifier;

pub use http::{dataset_url, AsyncHttpClient, HttpResponse, ReqwestClient};
pub use store::{DatasetStore, MergeOutcome};

/// Aggregate outcome of a fetch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// (map, marker) pairs that were tried.
    pub attempted: usize,
    /// Pairs for which some category returned a usable document.
    pub succeeded: usize,
    /// Individual category attempts that failed with a network or
    /// document error (plain non-200 answers are not counted).
    pub errors: usize,
}

impl FetchSummary {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

/// One (map, marker) work item.
#[derive(Debug, Clone)]
struct FetchJob {
    map_id: String,
    marker_id: String,
}

pub struct Fetcher {
    client: Arc<dyn AsyncHttpClient>,
    store: Arc<DatasetStore>,
    settings: FetchSettings,
    notifier: Arc<dyn Notifier>,
}

impl Fetcher {
    pub fn new(
        client: Arc<dyn AsyncHttpClient>,
        store: DatasetStore,
        settings: FetchSettings,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            store: Arc::new(store),
            settings,
            notifier,
        }
    }

    /// Builds a fetcher with the reqwest client and a store rooted at
    /// `dataset_dir`, as configured.
    pub async fn from_config(
        config: &PipelineConfig,
        dataset_dir: impl Into<std::path::PathBuf>,
        notifier: Arc<dyn Notifier>,
    ) -> PipelineResult<Self> {
        let client = ReqwestClient::new(&config.fetch)?;
        let store = DatasetStore::open(dataset_dir, config.fetch.dedupe_features).await?;
        Ok(Self::new(
            Arc::new(client),
            store,
            config.fetch.clone(),
            notifier,
        ))
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Fetches every map × marker pair, trying `categories` in order for each,
    /// and returns once all tasks have finished.
    #[instrument(skip_all, fields(maps = maps.len(), markers = marker_ids.len()))]
    pub async fn fetch_all(
        &self,
        maps: &[MapDefinition],
        marker_ids: &[String],
        categories: &[String],
    ) -> FetchSummary {
        let attempted = maps.len() * marker_ids.len();
        info!(
            "Attempting to download {} markers across {} maps...",
            attempted,
            maps.len()
        );

        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches.max(1)));
        let succeeded = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let categories: Arc<[String]> = categories.into();
        let mut tasks = JoinSet::new();

        for map in maps {
            for marker_id in marker_ids {
                let permit = match permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let job = FetchJob {
                    map_id: map.id.clone(),
                    marker_id: marker_id.clone(),
                };
                let client = self.client.clone();
                let store = self.store.clone();
                let settings = self.settings.clone();
                let categories = categories.clone();
                let succeeded = succeeded.clone();
                let errors = errors.clone();

                tasks.spawn(async move {
                    let _permit = permit;
                    let outcome =
                        fetch_job(client.as_ref(), &store, &settings, &categories, &job).await;
                    errors.fetch_add(outcome.errors, Ordering::Relaxed);
                    match outcome.accepted {
                        Some(category) => {
                            let total = succeeded.fetch_add(1, Ordering::Relaxed) + 1;
                            info!(
                                "Downloaded: {}/{} ({}) - Total: {}",
                                job.map_id,
                                job.marker_id,
                                display_category(&category),
                                total
                            );
                        }
                        None => debug!("No dataset for {}/{}", job.map_id, job.marker_id),
                    }
                });

                if !self.settings.launch_delay().is_zero() {
                    tokio::time::sleep(self.settings.launch_delay()).await;
                }
            }
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                warn!("Fetch task aborted: {}", err);
            }
        }

        let summary = FetchSummary {
            attempted,
            succeeded: succeeded.load(Ordering::Relaxed),
            errors: errors.load(Ordering::Relaxed),
        };
        info!(
            "Download complete: {} of {} pairs fetched, {} failed attempts",
            summary.succeeded, summary.attempted, summary.errors
        );
        self.notifier.notify(
            "Download Complete",
            &format!("Downloaded {} files", summary.succeeded),
        );
        summary
    }
}

struct JobOutcome {
    accepted: Option<String>,
    errors: usize,
}

/// Tries each category in order; the first 200 with a mergeable body wins
/// and the remaining categories are not requested.
async fn fetch_job(
    client: &dyn AsyncHttpClient,
    store: &DatasetStore,
    settings: &FetchSettings,
    categories: &[String],
    job: &FetchJob,
) -> JobOutcome {
    let mut errors = 0;
    for category in categories {
        if !settings.category_delay().is_zero() {
            tokio::time::sleep(settings.category_delay()).await;
        }

        match try_category(client, store, settings, category, job).await {
            Ok(_) => {
                return JobOutcome {
                    accepted: Some(category.clone()),
                    errors,
                }
            }
            Err(err) if err.is_not_found() => {
                debug!("{}", err);
            }
            Err(err) if err.is_network_error() => {
                errors += 1;
                warn!(
                    "Error downloading {}/{}/{}: {}",
                    job.map_id,
                    job.marker_id,
                    display_category(category),
                    err
                );
            }
            Err(err) => {
                errors += 1;
                warn!(
                    "Rejected {}/{}/{}: {}",
                    job.map_id,
                    job.marker_id,
                    display_category(category),
                    err
                );
            }
        }
    }
    JobOutcome {
        accepted: None,
        errors,
    }
}

async fn try_category(
    client: &dyn AsyncHttpClient,
    store: &DatasetStore,
    settings: &FetchSettings,
    category: &str,
    job: &FetchJob,
) -> FetchResult<MergeOutcome> {
    let url = dataset_url(&settings.base_url, &job.map_id, category, &job.marker_id);
    let response = client.get(&url).await?;
    if !response.is_ok() {
        return Err(FetchError::Status {
            url,
            status: response.status,
        });
    }
    store.merge(&job.marker_id, &response.body).await
}

fn display_category(category: &str) -> &str {
    if category.is_empty() {
        "<root>"
    } else {
        category
    }
}
