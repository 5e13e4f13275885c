//! Member sub-resource fetching
//!
//! Each member URL is fetched and reduced to its `forms` field. Two execution
//! modes share the same per-URL path (cache lookup, GET, projection):
//!
//! - **Sequential**: one request at a time, first failure aborts the batch.
//! - **Concurrent**: every request is in flight at once (or up to
//!   `max_concurrent`), each URL gets the configured retries, and results are
//!   joined by input index so output order never depends on completion order.
//!
//! Either way the caller gets one result per URL or an error, never a partial list.

use crate::cache::{OP_SUB_RESOURCE, ResponseCache};
use crate::client::ApiClient;
use crate::config::{FetchConfig, RetryConfig};
use crate::error::Result;
use crate::extract::{FORMS_FIELD, extract_field};
use crate::retry::fetch_with_retry;
use crate::types::{FetchMode, SubResourcePayload};
use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;

/// Fetches member sub-resources through the shared cache
#[derive(Clone, Debug)]
pub struct SubResourceFetcher {
    client: ApiClient,
    cache: Arc<ResponseCache>,
    mode: FetchMode,
    max_concurrent: Option<usize>,
    retry: RetryConfig,
}

impl SubResourceFetcher {
    /// Create a fetcher using the mode, concurrency bound and retry policy from `config`
    pub fn new(client: ApiClient, cache: Arc<ResponseCache>, config: &FetchConfig) -> Self {
        Self {
            client,
            cache,
            mode: config.mode,
            max_concurrent: config.max_concurrent,
            retry: config.retry.clone(),
        }
    }

    /// Fetch every URL, returning one payload per URL in input order
    pub async fn fetch_many(&self, urls: &[String]) -> Result<Vec<SubResourcePayload>> {
        tracing::debug!(count = urls.len(), mode = ?self.mode, "fetching sub-resources");

        match self.mode {
            FetchMode::Sequential => self.fetch_sequential(urls).await,
            FetchMode::Concurrent => self.fetch_concurrent(urls).await,
        }
    }

    async fn fetch_sequential(&self, urls: &[String]) -> Result<Vec<SubResourcePayload>> {
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            results.push(self.fetch_one(url).await?);
        }
        Ok(results)
    }

    async fn fetch_concurrent(&self, urls: &[String]) -> Result<Vec<SubResourcePayload>> {
        let limit = self.max_concurrent.unwrap_or(urls.len()).max(1);

        // `buffered` yields in submission order, so results line up with `urls`
        stream::iter(urls.iter().enumerate())
            .map(|(index, url)| async move {
                fetch_with_retry(&self.retry, || self.fetch_one(url))
                    .await
                    .inspect_err(|e| {
                        tracing::warn!(index, url = %url, error = %e, "sub-resource fetch failed");
                    })
            })
            .buffered(limit)
            .try_collect()
            .await
    }

    /// Fetch one URL and keep its `forms` field, consulting the cache first
    pub async fn fetch_one(&self, url: &str) -> Result<SubResourcePayload> {
        self.cache
            .cached_call(OP_SUB_RESOURCE, url, || async {
                let body = self.client.fetch_json(url).await?;
                extract_field(&body, FORMS_FIELD)
            })
            .await
    }
}
