//! Incremental synchronisation of compiled listings to a depot.
//!
//! The depot's published index (`.depot-index.json`) is the baseline. A listing whose
//! uncompressed `sha256` and `size` both match its baseline entry is not uploaded again;
//! every other listing has all of its artifacts uploaded. The new index always replaces
//! the old one completely and is uploaded on every run, even when nothing changed.
//!
//! # Errors
//! A missing index is fatal unless the caller explicitly allows a full resync, so that a
//! misconfigured depot never triggers an unannounced re-upload of everything. Any depot or
//! local I/O failure aborts the run before a new index is published.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tracing::{debug, error, info, warn};

use crate::compile::{CompileError, CompiledListings};
use crate::contract::{Depot, DepotError, DepotExt};
use crate::descriptor::{json_path, DepotIndex, FileDescriptor, ListingDescriptor, INDEX_NAME};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(
        "no depot index found at {url}. If this depot is new or its index was lost, \
         rerun with --full-resync to upload every listing"
    )]
    MissingIndex { url: String },

    #[error(transparent)]
    Depot(#[from] DepotError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("failed to read local artifact {path}: {source}")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("local artifact {path} no longer matches its descriptor")]
    LocalArtifactChanged { path: PathBuf },
}

/// What a sync run did.
#[derive(Debug)]
pub struct SyncReport {
    /// Listings whose artifacts were uploaded.
    pub uploaded: Vec<String>,
    /// Listings identical to the baseline, not uploaded.
    pub unchanged: Vec<String>,
    /// The index that was published.
    pub index: ListingDescriptor,
}

/// Depot path of the published index.
pub fn index_path() -> String {
    json_path(INDEX_NAME)
}

/// Reconcile `compiled` against the depot's published index and publish a new one.
pub async fn synchronise<D>(
    depot: &D,
    compiled: &CompiledListings,
    allow_full_resync: bool,
) -> Result<SyncReport, SyncError>
where
    D: Depot + ?Sized,
{
    let index_path = index_path();
    info!(index = %depot.public_url(&index_path), "[SYNC] Fetching published depot index");

    let baseline: DepotIndex = match depot.read_json(&index_path).await? {
        Some(index) => index,
        None if allow_full_resync => {
            warn!("[SYNC] No depot index found, full resync requested: uploading every listing");
            Vec::new()
        }
        None => {
            error!("[SYNC][ERROR] No depot index found and full resync not requested");
            return Err(SyncError::MissingIndex {
                url: depot.public_url(&index_path),
            });
        }
    };
    let baseline: HashMap<&str, &ListingDescriptor> = baseline
        .iter()
        .map(|listing| (listing.name.as_str(), listing))
        .collect();
    debug!(entries = baseline.len(), "[SYNC] Loaded baseline index");

    let (unchanged, changed): (Vec<&ListingDescriptor>, Vec<&ListingDescriptor>) = compiled
        .listings()
        .iter()
        .partition(|listing| {
            baseline
                .get(listing.name.as_str())
                .is_some_and(|previous| previous.same_content(listing))
        });

    for listing in &unchanged {
        info!(listing = %listing.name, "[SYNC] Listing unchanged, skipping upload");
    }

    let output_dir = compiled.writer().output_dir();
    try_join_all(
        changed
            .iter()
            .map(|listing| upload_listing(depot, output_dir, listing)),
    )
    .await?;

    let mut index: DepotIndex = compiled.listings().to_vec();
    index.sort_by(|a, b| a.name.cmp(&b.name));
    let index = compiled.writer().write(INDEX_NAME, &index).await?;
    upload_listing(depot, output_dir, &index).await?;

    info!(
        uploaded = changed.len(),
        unchanged = unchanged.len(),
        index = %depot.public_url(&index.file.url),
        "[SYNC] Depot synchronised"
    );

    Ok(SyncReport {
        uploaded: changed.iter().map(|listing| listing.name.clone()).collect(),
        unchanged: unchanged.iter().map(|listing| listing.name.clone()).collect(),
        index,
    })
}

/// Upload every artifact of one listing, read back from the output folder.
async fn upload_listing<D>(
    depot: &D,
    output_dir: &Path,
    listing: &ListingDescriptor,
) -> Result<(), SyncError>
where
    D: Depot + ?Sized,
{
    info!(listing = %listing.name, "[SYNC][UPLOAD] Uploading changed listing");
    try_join_all(
        listing
            .artifacts()
            .into_iter()
            .map(|file| upload_artifact(depot, output_dir, file)),
    )
    .await?;
    Ok(())
}

async fn upload_artifact<D>(
    depot: &D,
    output_dir: &Path,
    file: &FileDescriptor,
) -> Result<(), SyncError>
where
    D: Depot + ?Sized,
{
    let path = output_dir.join(&file.url);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| SyncError::LocalRead {
            path: path.clone(),
            source,
        })?;
    if !file.matches(&bytes) {
        error!(path = %path.display(), "[SYNC][ERROR] Local artifact differs from its descriptor");
        return Err(SyncError::LocalArtifactChanged { path });
    }

    depot.write(&file.url, bytes).await?;
    debug!(url = %depot.public_url(&file.url), "[SYNC][UPLOAD] Artifact uploaded");
    Ok(())
}
