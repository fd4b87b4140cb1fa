#![doc = "HTTP client for the upstream version-metadata API."]
//
//! # Upstream client
//!
//! [`HttpVersionClient`] talks to the version-metadata API that loader listings are assembled
//! from:
//!
//! - `GET {base_url}/versions`: every published version as `[{ "id", "version" }]`
//! - `GET {base_url}/versions/{id}`: the full record for one version
//!
//! Every request carries the `x-api-key` header. A `401` means the key was rejected and is
//! reported as [`UpstreamError::Unauthorized`]. In-flight requests are bounded by a semaphore
//! because the assembler fetches all version details at once.

use std::sync::Arc;

use async_trait::async_trait;
use listing_depot_core::contract::{UpstreamError, VersionDetails, VersionSource, VersionSummary};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;

const API_KEY_HEADER: &str = "x-api-key";

pub struct HttpVersionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: Arc<Semaphore>,
}

impl HttpVersionClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        tracing::info!(base_url, max_concurrency, "Initialized upstream version client");
        HttpVersionClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            limiter: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        // The semaphore is never closed, so acquiring cannot fail.
        let _permit = self.limiter.acquire().await.ok();
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Requesting upstream");

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::error!(url = %url, "Upstream rejected the API key");
            return Err(UpstreamError::Unauthorized);
        }
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(url = %url, status = status.as_u16(), "Upstream API error");
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl VersionSource for HttpVersionClient {
    async fn list_versions(&self) -> Result<Vec<VersionSummary>, UpstreamError> {
        self.get_json("/versions").await
    }

    async fn get_version_details(&self, id: &str) -> Result<VersionDetails, UpstreamError> {
        self.get_json(&format!("/versions/{id}")).await
    }
}
