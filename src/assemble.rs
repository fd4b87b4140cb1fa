//! Assembly of the loader listings from upstream version metadata.
//!
//! Produces, for a compiler run:
//! - `loader-<version>`: the full upstream record of each version
//! - `loaders`: every published version, in upstream order
//! - `minecraft`: Minecraft version → loader versions built for it
//!
//! Version strings come from a third party and become file and depot paths, so every
//! version that fails [`is_safe_path`] is skipped with a warning instead of aborting.

use std::collections::{BTreeMap, HashSet};

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::compile::{CompileError, ListingCompiler};
use crate::contract::{UpstreamError, VersionSource};
use crate::safe_path::is_safe_path;

pub const LOADERS_LISTING: &str = "loaders";
pub const MINECRAFT_LISTING: &str = "minecraft";

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Entry of the `loaders` listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoaderEntry {
    pub version: String,
    pub stable: bool,
    pub minecraft_versions: Vec<String>,
}

/// What was registered and what was dropped.
#[derive(Debug, Default)]
pub struct AssemblyReport {
    pub registered: Vec<String>,
    /// Upstream version strings rejected by the path-safety check.
    pub skipped: Vec<String>,
}

/// Listing name for a single loader version.
pub fn version_listing(version: &str) -> String {
    format!("loader-{version}")
}

/// Fetch every loader version from `source` and register its listings with `compiler`.
pub async fn register_loader_listings<S>(
    compiler: &mut ListingCompiler,
    source: &S,
) -> Result<AssemblyReport, AssembleError>
where
    S: VersionSource + ?Sized,
{
    let summaries = source.list_versions().await?;
    info!(count = summaries.len(), "Fetched upstream version list");

    let mut report = AssemblyReport::default();
    let mut accepted = Vec::with_capacity(summaries.len());
    let mut seen = HashSet::new();
    for summary in summaries {
        if !is_safe_path(&summary.version) {
            warn!(
                id = %summary.id,
                version = %summary.version,
                "Skipping upstream version with unsafe identifier"
            );
            report.skipped.push(summary.version);
        } else if !seen.insert(summary.version.clone()) {
            warn!(
                id = %summary.id,
                version = %summary.version,
                "Skipping duplicate upstream version"
            );
        } else {
            accepted.push(summary);
        }
    }

    let details = try_join_all(
        accepted
            .iter()
            .map(|summary| source.get_version_details(&summary.id)),
    )
    .await?;

    let mut loaders = Vec::with_capacity(details.len());
    let mut minecraft: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (summary, detail) in accepted.iter().zip(details) {
        for game_version in &detail.minecraft_versions {
            minecraft
                .entry(game_version.clone())
                .or_default()
                .push(summary.version.clone());
        }
        loaders.push(LoaderEntry {
            version: summary.version.clone(),
            stable: detail.stable,
            minecraft_versions: detail.minecraft_versions.clone(),
        });

        let name = version_listing(&summary.version);
        compiler.register(name.clone(), detail)?;
        report.registered.push(name);
    }

    compiler.register(LOADERS_LISTING, loaders)?;
    report.registered.push(LOADERS_LISTING.to_string());
    compiler.register(MINECRAFT_LISTING, minecraft)?;
    report.registered.push(MINECRAFT_LISTING.to_string());

    info!(
        registered = report.registered.len(),
        skipped = report.skipped.len(),
        "Registered loader listings"
    );
    Ok(report)
}
