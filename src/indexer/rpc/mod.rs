pub mod response;

use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::indexer::rpc::response::{PageParser, QueryResponse};
use crate::models::common::Config;
use crate::models::datasets::query::{QueryResponsePage, QuerySpec};
use crate::utils::retry::{retry, RetryConfig};

/// The retrieval capability: run one query, get one page back.
pub trait QueryClient {
    fn send(&self, query: &QuerySpec) -> impl Future<Output = Result<QueryResponsePage>> + Send;
}

/// HTTP client for a HyperSync-style `/query` endpoint. Transport failures are retried
/// here with backoff; a page that fails field validation is not.
pub struct HypersyncClient {
    http: reqwest::Client,
    query_url: Url,
    bearer_token: Option<String>,
    retry_config: RetryConfig,
}

impl HypersyncClient {
    pub fn new(
        url: &Url,
        bearer_token: Option<String>,
        timeout: Duration,
        retry_config: RetryConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        let query_url = url.join("query").context("invalid service URL")?;

        Ok(Self {
            http,
            query_url,
            bearer_token,
            retry_config,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.hypersync_url,
            config.bearer_token.clone(),
            Duration::from_millis(config.http_timeout_ms),
            RetryConfig::from(&config.retry),
        )
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    async fn post_query(&self, query: &QuerySpec) -> Result<QueryResponse> {
        let mut request = self.http.post(self.query_url.clone()).json(query);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Query from block {} failed. Error details:\n{:#?}", query.from_block, e);
            anyhow!("HTTP error: {}", e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Service returned {}: {}", status, body));
        }

        response
            .json::<QueryResponse>()
            .await
            .map_err(|e| anyhow!("Failed to read query response: {}", e))
    }
}

impl QueryClient for HypersyncClient {
    async fn send(&self, query: &QuerySpec) -> Result<QueryResponsePage> {
        let response = retry(|| self.post_query(query), &self.retry_config, "query").await?;
        response
            .parse_page()
            .with_context(|| format!("malformed page for query from block {}", query.from_block))
    }
}
