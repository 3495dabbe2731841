//! HTTP client for the dashboard read endpoints.

use crate::error::{FetchError, FetchResult};
use casewatch_core::{ResourceKey, ResourceValue};
use futures_util::future::BoxFuture;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of values for resource keys.
///
/// Abstracts the transport so the polling cache can be driven by in-memory
/// fakes in tests. Dropping the returned future cancels the request.
pub trait Fetcher<V>: Send + Sync {
    /// Fetch the current value for `key`.
    fn fetch<'a>(&'a self, key: &'a ResourceKey) -> BoxFuture<'a, FetchResult<V>>;
}

/// reqwest-backed fetcher for the case-management backend.
pub struct HttpFetcher {
    /// HTTP client.
    client: Client,
    /// Backend base URL without trailing slash (e.g., "http://localhost:8000").
    base_url: String,
}

impl HttpFetcher {
    /// Create a new fetcher.
    ///
    /// # Arguments
    /// * `base_url` - Backend root; endpoint paths are appended to it.
    /// * `timeout` - Transport-level timeout per request.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for `key`, without the query string.
    pub fn url_for(&self, key: &ResourceKey) -> String {
        format!("{}{}", self.base_url, key.path())
    }

    /// GET the endpoint for `key` and decode its body.
    pub async fn fetch_value(&self, key: &ResourceKey) -> FetchResult<ResourceValue> {
        let url = self.url_for(key);
        debug!(%url, key = %key, "Fetching resource");

        let response = self
            .client
            .get(&url)
            .query(&key.query_pairs())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(key = %key, status = status.as_u16(), "Non-success response");
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(map_transport_error)?;

        let value = ResourceValue::decode(key.resource, &body).map_err(|e| {
            warn!(key = %key, error = %e, "Response body did not match expected shape");
            FetchError::Parse(format!("{key}: {e}"))
        })?;

        debug!(key = %key, items = ?value.item_count(), "Fetched resource");
        Ok(value)
    }
}

impl Fetcher<ResourceValue> for HttpFetcher {
    fn fetch<'a>(&'a self, key: &'a ResourceKey) -> BoxFuture<'a, FetchResult<ResourceValue>> {
        Box::pin(self.fetch_value(key))
    }
}

fn map_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Network("request timed out".to_string())
    } else if e.is_decode() {
        FetchError::Parse(format!("Failed to read response: {e}"))
    } else {
        FetchError::Network(format!("HTTP request failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_trims_trailing_slash() {
        let fetcher = HttpFetcher::new("http://backend:8000/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            fetcher.url_for(&ResourceKey::threats()),
            "http://backend:8000/api/threats/recent"
        );
    }

    #[test]
    fn test_url_is_stable_across_calls() {
        let fetcher = HttpFetcher::new("http://backend:8000", DEFAULT_TIMEOUT).unwrap();
        let key = ResourceKey::cases().with_param("limit", 5);
        assert_eq!(fetcher.url_for(&key), fetcher.url_for(&key.clone()));
    }
}
