//! Listing compiler: turns JSON-serialisable payloads into content-addressed artifacts.
//!
//! A run has two phases. During collection, callers [`register`](ListingCompiler::register)
//! listings by name; each one is materialised on its own tokio task as soon as its payload
//! is available, so registration order and completion order are independent. The
//! collection phase ends with [`finalize`](ListingCompiler::finalize), which joins every
//! task, writes the `index` listing and hands back the complete [`CompiledListings`] for
//! the sync engine.
//!
//! Every listing `<name>` is written to the output folder as:
//! - `<name>.json` (compact or pretty JSON, one toggle per run)
//! - `<name>.json.<ext>` for every [`CompressionScheme`]

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::compress::{compress_all, CompressError, CompressionScheme};
use crate::descriptor::{json_path, FileDescriptor, ListingDescriptor, INDEX_NAME};
use crate::safe_path::is_safe_path;

/// Name of the listing `finalize` writes, summarising every other listing.
pub const INDEX_LISTING: &str = "index";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("listing {0:?} was registered twice in one run")]
    DuplicateListing(String),

    #[error("listing name {0:?} is not a safe path segment")]
    UnsafeName(String),

    #[error("listing name {0:?} is reserved for the depot index")]
    ReservedName(String),

    #[error("failed to serialize listing {name:?}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to compute payload for listing {name:?}: {source}")]
    Payload {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compress listing {name:?}: {source}")]
    Compress {
        name: String,
        #[source]
        source: CompressError,
    },

    #[error("compiler produced no {scheme} artifact for listing {name:?}")]
    MissingScheme {
        name: String,
        scheme: CompressionScheme,
    },

    #[error("compile task for listing {name:?} failed: {source}")]
    Task {
        name: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Writes one listing's artifacts into the output folder and describes them.
///
/// Shared by every compile task of a run, and by the sync engine for the depot index.
#[derive(Debug, Clone)]
pub struct ListingWriter {
    output_dir: PathBuf,
    pretty: bool,
    epoch: DateTime<Utc>,
}

impl ListingWriter {
    pub fn new(output_dir: impl Into<PathBuf>, pretty: bool, epoch: DateTime<Utc>) -> Self {
        Self {
            output_dir: output_dir.into(),
            pretty,
            epoch,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The build epoch stamped on every listing of the run.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Serialise `payload`, write `<name>.json` and its compressed variants, and
    /// describe the bytes that were written.
    pub async fn write<T>(
        &self,
        name: &str,
        payload: &T,
    ) -> Result<ListingDescriptor, CompileError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = self.encode(name, payload)?;
        self.write_encoded(name, encoded).await
    }

    /// Canonical JSON bytes for `payload`, pretty-printed if the run asks for it.
    pub fn encode<T>(&self, name: &str, payload: &T) -> Result<Vec<u8>, CompileError>
    where
        T: Serialize + ?Sized,
    {
        if self.pretty {
            serde_json::to_vec_pretty(payload)
        } else {
            serde_json::to_vec(payload)
        }
        .map_err(|source| CompileError::Serialize {
            name: name.to_string(),
            source,
        })
    }

    /// Write already-encoded JSON as listing `name`. The uncompressed artifact is written
    /// before compression starts.
    pub async fn write_encoded(
        &self,
        name: &str,
        encoded: Vec<u8>,
    ) -> Result<ListingDescriptor, CompileError> {
        if !is_safe_path(name) {
            return Err(CompileError::UnsafeName(name.to_string()));
        }

        let json_url = json_path(name);
        self.write_file(&json_url, &encoded).await?;
        let file = FileDescriptor::of(json_url.as_str(), &encoded);

        let compressed = compress_all(Arc::from(encoded))
            .await
            .map_err(|source| CompileError::Compress {
                name: name.to_string(),
                source,
            })?;

        let writes = compressed.iter().map(|(scheme, bytes)| {
            let url = format!("{json_url}.{}", scheme.extension());
            async move {
                self.write_file(&url, bytes).await?;
                Ok::<_, CompileError>((*scheme, FileDescriptor::of(url, bytes)))
            }
        });
        let mut variants: BTreeMap<CompressionScheme, FileDescriptor> =
            try_join_all(writes).await?.into_iter().collect();

        let mut take = |scheme: CompressionScheme| {
            variants
                .remove(&scheme)
                .ok_or_else(|| CompileError::MissingScheme {
                    name: name.to_string(),
                    scheme,
                })
        };
        let listing = ListingDescriptor {
            name: name.to_string(),
            last_modified: self.epoch,
            brotli: take(CompressionScheme::Brotli)?,
            gzip: take(CompressionScheme::Gzip)?,
            file,
        };

        info!(
            listing = %listing.name,
            size = listing.file.size,
            sha256 = %listing.file.sha256,
            "Compiled listing"
        );
        Ok(listing)
    }

    async fn write_file(&self, relative: &str, bytes: &[u8]) -> Result<(), CompileError> {
        let path = self.output_dir.join(relative);
        let io = |source| CompileError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(io)?;
        debug!(path = %path.display(), size = bytes.len(), "Wrote artifact");
        Ok(())
    }
}

/// Registry of every listing produced in one run.
pub struct ListingCompiler {
    writer: Arc<ListingWriter>,
    pending: BTreeMap<String, JoinHandle<Result<ListingDescriptor, CompileError>>>,
}

impl ListingCompiler {
    /// Start a run writing into `output_dir`. The build epoch is captured here.
    pub fn new(output_dir: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            writer: Arc::new(ListingWriter::new(output_dir, pretty, Utc::now())),
            pending: BTreeMap::new(),
        }
    }

    pub fn writer(&self) -> &ListingWriter {
        &self.writer
    }

    /// Names registered so far.
    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(String::as_str)
    }

    /// Register a listing whose payload is already known.
    pub fn register<T>(&mut self, name: impl Into<String>, payload: T) -> Result<(), CompileError>
    where
        T: Serialize + Send + 'static,
    {
        self.register_with(name, async move { Ok::<_, Infallible>(payload) })
    }

    /// Register a listing whose payload is still being computed. The computation is
    /// driven on its own task; a failure surfaces from [`finalize`](Self::finalize).
    pub fn register_with<T, E, F>(
        &mut self,
        name: impl Into<String>,
        payload: F,
    ) -> Result<(), CompileError>
    where
        T: Serialize + Send + 'static,
        E: Into<BoxError>,
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let name = name.into();
        if self.pending.contains_key(&name) {
            error!(listing = %name, "Listing registered twice");
            return Err(CompileError::DuplicateListing(name));
        }
        if !is_safe_path(&name) {
            error!(listing = %name, "Listing name is not a safe path segment");
            return Err(CompileError::UnsafeName(name));
        }
        if name == INDEX_NAME {
            error!(listing = %name, "Listing name is reserved for the depot index");
            return Err(CompileError::ReservedName(name));
        }

        let writer = Arc::clone(&self.writer);
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let value = payload.await.map_err(|e| CompileError::Payload {
                name: task_name.clone(),
                source: e.into(),
            })?;
            let encoded = writer.encode(&task_name, &value)?;
            writer.write_encoded(&task_name, encoded).await
        });

        debug!(listing = %name, "Registered listing");
        self.pending.insert(name, handle);
        Ok(())
    }

    /// Join every registered listing, then write the `index` listing describing them.
    ///
    /// The first failure aborts the remaining tasks and is returned.
    pub async fn finalize(self) -> Result<CompiledListings, CompileError> {
        let ListingCompiler { writer, pending } = self;
        if pending.contains_key(INDEX_LISTING) {
            for handle in pending.values() {
                handle.abort();
            }
            return Err(CompileError::DuplicateListing(INDEX_LISTING.to_string()));
        }

        let mut listings = Vec::with_capacity(pending.len() + 1);
        let mut remaining = pending.into_iter();
        while let Some((name, handle)) = remaining.next() {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(source) => Err(CompileError::Task { name, source }),
            };
            match outcome {
                Ok(listing) => listings.push(listing),
                Err(e) => {
                    error!(error = %e, "Listing compilation failed, aborting run");
                    for (_, handle) in remaining {
                        handle.abort();
                    }
                    return Err(e);
                }
            }
        }

        let index = writer.write(INDEX_LISTING, &listings).await?;
        listings.push(index);
        info!(listings = listings.len(), "All listings compiled");

        Ok(CompiledListings { writer, listings })
    }
}

/// Output of a finished collection phase: every listing of the run, `index` included.
#[derive(Debug, Clone)]
pub struct CompiledListings {
    writer: Arc<ListingWriter>,
    listings: Vec<ListingDescriptor>,
}

impl CompiledListings {
    pub fn writer(&self) -> &ListingWriter {
        &self.writer
    }

    pub fn listings(&self) -> &[ListingDescriptor] {
        &self.listings
    }

    pub fn get(&self, name: &str) -> Option<&ListingDescriptor> {
        self.listings.iter().find(|listing| listing.name == name)
    }
}
