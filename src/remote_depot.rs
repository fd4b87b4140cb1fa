//! Depot backed by a WebDAV-style HTTP store.
//!
//! Uploads are plain `PUT`s, but the store does not create intermediate directories, so
//! every ancestor collection is created with `MKCOL` first. A collection that already
//! exists answers `405 Method Not Allowed`, which counts as success. Collections known to
//! exist are remembered for the lifetime of the depot so each one is requested at most
//! once per process (two concurrent first uploads into the same directory may both ask).

use std::collections::HashSet;
use std::fmt;
use std::sync::{LazyLock, Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info};

use crate::contract::{Depot, DepotError};

static MKCOL: LazyLock<Method> =
    LazyLock::new(|| Method::from_bytes(b"MKCOL").expect("MKCOL is a valid method token"));

/// Basic-auth credentials injected into every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct RemoteDepot {
    http: reqwest::Client,
    base_url: String,
    root: Vec<String>,
    credentials: Credentials,
    created: Mutex<HashSet<String>>,
}

impl RemoteDepot {
    /// `base_url` is the server endpoint (assumed to exist); `root` is a `/`-separated
    /// prefix below it that is created on demand, and may be empty.
    pub fn new(base_url: &str, root: &str, credentials: Credentials) -> Result<Self, DepotError> {
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            root: split_segments(root),
            credentials,
            created: Mutex::new(HashSet::new()),
        })
    }

    /// Full path segments below the base URL for a depot-relative path.
    fn segments(&self, path: &str) -> Vec<String> {
        let mut segments = self.root.clone();
        segments.extend(split_segments(path));
        segments
    }

    fn url_for(&self, segments: &[String]) -> String {
        format!("{}/{}", self.base_url, segments.join("/"))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DepotError> {
        request.send().await.map_err(|e| {
            if e.is_connect() {
                DepotError::Connect {
                    url: self.base_url.clone(),
                    source: e,
                }
            } else {
                DepotError::Http(e)
            }
        })
    }

    fn is_created(&self, collection: &str) -> bool {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(collection)
    }

    fn mark_created(&self, collection: String) {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection);
    }

    /// Make sure the collection at `segments` exists. Idempotent.
    async fn ensure_collection(&self, segments: &[String]) -> Result<(), DepotError> {
        let key = segments.join("/");
        if self.is_created(&key) {
            return Ok(());
        }

        let url = format!("{}/", self.url_for(segments));
        let response = self.send(self.request(MKCOL.clone(), &url)).await?;
        match response.status() {
            StatusCode::CREATED | StatusCode::OK | StatusCode::NO_CONTENT => {
                info!(url = %url, "Created depot collection");
            }
            StatusCode::METHOD_NOT_ALLOWED => {
                debug!(url = %url, "Depot collection already exists");
            }
            status => return Err(protocol_error("MKCOL", &url, status, response).await),
        }

        self.mark_created(key);
        Ok(())
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

async fn protocol_error(
    method: &str,
    url: &str,
    status: StatusCode,
    response: Response,
) -> DepotError {
    let body = response.text().await.unwrap_or_default();
    DepotError::Protocol {
        method: method.to_string(),
        url: url.to_string(),
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl Depot for RemoteDepot {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, DepotError> {
        let url = self.url_for(&self.segments(path));
        let response = self.send(self.request(Method::GET, &url)).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "Depot object not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(protocol_error("GET", &url, status, response).await);
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn write(&self, path: &str, bytes: Vec<u8>) -> Result<(), DepotError> {
        let segments = self.segments(path);
        for depth in 1..segments.len() {
            self.ensure_collection(&segments[..depth]).await?;
        }

        let url = self.url_for(&segments);
        let size = bytes.len();
        let response = self
            .send(self.request(Method::PUT, &url).body(bytes))
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(protocol_error("PUT", &url, status, response).await);
        }

        info!(url = %url, size, "Uploaded depot object");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.url_for(&self.segments(path))
    }
}
