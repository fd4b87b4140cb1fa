/// `load_config` module: loads the static YAML publish config and injects the upstream secret
/// from the environment.
///
/// The YAML file carries no secrets. `UPSTREAM_API_KEY` is read from the environment (a `.env`
/// file is honoured by the binary). Depot selection is also environment-driven, see
/// [`listing_depot_core::config::DepotConfig`].
///
/// ```yaml
/// output_dir: ./build/listings
/// pretty: false
/// upstream:
///   base_url: https://meta.example.com/api
///   max_concurrency: 8
/// ```
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const UPSTREAM_API_KEY: &str = "UPSTREAM_API_KEY";

fn default_max_concurrency() -> usize {
    8
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    output_dir: PathBuf,
    #[serde(default)]
    pretty: bool,
    upstream: RawUpstream,
}

#[derive(Debug, Deserialize)]
struct RawUpstream {
    base_url: String,
    #[serde(default = "default_max_concurrency")]
    max_concurrency: usize,
}

/// Everything a publish run needs besides the depot.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub output_dir: PathBuf,
    pub pretty: bool,
    pub upstream: UpstreamConfig,
}

#[derive(Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub max_concurrency: usize,
    pub api_key: String,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("max_concurrency", &self.max_concurrency)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Loads a static YAML config file and injects `UPSTREAM_API_KEY` from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PublishConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let raw: RawConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML: {e}")
    })?;

    if raw.upstream.max_concurrency == 0 {
        bail!("upstream.max_concurrency must be at least 1");
    }

    let api_key = match std::env::var(UPSTREAM_API_KEY) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            error!("{UPSTREAM_API_KEY} missing in environment");
            bail!("{UPSTREAM_API_KEY} environment variable not set");
        }
    };

    info!(
        output_dir = ?raw.output_dir,
        pretty = raw.pretty,
        upstream = %raw.upstream.base_url,
        max_concurrency = raw.upstream.max_concurrency,
        "Parsed config YAML successfully"
    );

    Ok(PublishConfig {
        output_dir: raw.output_dir,
        pretty: raw.pretty,
        upstream: UpstreamConfig {
            base_url: raw.upstream.base_url,
            max_concurrency: raw.upstream.max_concurrency,
            api_key,
        },
    })
}
