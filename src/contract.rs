//! # contract: the seams between the sync core and the outside world
//!
//! This module defines the two traits the core talks through:
//!
//! - [`Depot`]: the storage backend listings are published to (local folder or
//!   remote WebDAV-style store). Exactly three capabilities: read, write and
//!   public URL resolution.
//! - [`VersionSource`]: the upstream version-metadata API that loader listings
//!   are assembled from.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so tests can script deterministic
//!   backends (`MockDepot`, `MockVersionSource`).
//!
//! ## Errors
//! - Depot failures are reported as [`DepotError`]; "not found" is *not* an
//!   error, it is `Ok(None)` from [`Depot::read`].
//! - Upstream failures are reported as [`UpstreamError`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use mockall::automock;

/// Errors raised by a [`Depot`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum DepotError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("depot returned {status} for {method} {url}: {body}")]
    Protocol {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("cannot connect to depot backend at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed JSON at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage backend for published listings.
///
/// Paths are relative, `/`-separated identifiers such as `loaders.json.br`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Depot: Send + Sync {
    /// Read the bytes stored at `path`, or `None` if nothing is stored there.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, DepotError>;

    /// Store `bytes` at `path`, creating whatever parent structure the backend needs.
    async fn write(&self, path: &str, bytes: Vec<u8>) -> Result<(), DepotError>;

    /// The URL a client would use to fetch `path`.
    fn public_url(&self, path: &str) -> String;
}

/// Typed-JSON convenience on top of [`Depot::read`].
#[async_trait]
pub trait DepotExt: Depot {
    /// Read and deserialize `path`. Malformed content is a fatal error.
    async fn read_json<T>(&self, path: &str) -> Result<Option<T>, DepotError>
    where
        T: DeserializeOwned + Send;
}

#[async_trait]
impl<D: Depot + ?Sized> DepotExt for D {
    async fn read_json<T>(&self, path: &str) -> Result<Option<T>, DepotError>
    where
        T: DeserializeOwned + Send,
    {
        let Some(bytes) = self.read(path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| DepotError::Json {
                path: path.to_string(),
                source,
            })
    }
}

/// One entry of the upstream version list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub id: String,
    pub version: String,
}

/// Full upstream record for a single loader version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDetails {
    pub id: String,
    pub version: String,
    /// Minecraft versions this loader build targets.
    #[serde(default)]
    pub minecraft_versions: Vec<String>,
    #[serde(default)]
    pub stable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_url: Option<String>,
}

/// Errors from the upstream version-metadata API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("authentication rejected by upstream, check UPSTREAM_API_KEY")]
    Unauthorized,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read access to the upstream version-metadata API.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// List every published loader version.
    async fn list_versions(&self) -> Result<Vec<VersionSummary>, UpstreamError>;

    /// Fetch the full record for one version id.
    async fn get_version_details(&self, id: &str) -> Result<VersionDetails, UpstreamError>;
}
