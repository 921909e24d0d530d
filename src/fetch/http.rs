//! HTTP client abstraction so the fetcher can be driven by a mock in tests.

use async_trait::async_trait;
use tracing::trace;

use crate::config::FetchSettings;
use crate::errors::{FetchError, FetchResult};

/// Status and body of a completed request. Non-200 responses are returned
/// as values; only transport failures are errors.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[async_trait]
pub trait AsyncHttpClient: Send + Sync {
    async fn get(&self, url: &str) -> FetchResult<HttpResponse>;
}

/// Production client backed by reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(settings: &FetchSettings) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::ClientSetup(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> FetchResult<HttpResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        trace!("GET {} -> {}", url, status);

        let body = response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            reason: format!("failed to read body: {}", e),
        })?;

        Ok(HttpResponse { status, body })
    }
}

/// Remote location of a marker dataset. An empty category has no segment.
pub fn dataset_url(base_url: &str, map_id: &str, category: &str, marker_id: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if category.is_empty() {
        format!("{}/{}/{}.geojson", base, map_id, marker_id)
    } else {
        format!("{}/{}/{}/{}.geojson", base, map_id, category, marker_id)
    }
}
