use std::path::PathBuf;

use tracing::{debug, info};

use crate::contract::{Depot, DepotError};
use crate::local_depot::LocalDepot;
use crate::remote_depot::{Credentials, RemoteDepot};

pub const DEPOT_LOCAL_DIR: &str = "DEPOT_LOCAL_DIR";
pub const DEPOT_REMOTE_URL: &str = "DEPOT_REMOTE_URL";
pub const DEPOT_REMOTE_ROOT: &str = "DEPOT_REMOTE_ROOT";
pub const DEPOT_REMOTE_USER: &str = "DEPOT_REMOTE_USER";
pub const DEPOT_REMOTE_PASSWORD: &str = "DEPOT_REMOTE_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingVar(String),

    #[error("no depot configured: set {local} for a local depot or {remote} for a remote one")]
    NoDepot {
        local: &'static str,
        remote: &'static str,
    },
}

/// Which depot a run publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepotConfig {
    Local {
        root: PathBuf,
    },
    Remote {
        base_url: String,
        root: String,
        credentials: Credentials,
    },
}

impl DepotConfig {
    /// Select the depot from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Select the depot from `lookup`: a local root wins, otherwise a remote endpoint is
    /// required together with its credentials. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        if let Some(root) = get(DEPOT_LOCAL_DIR) {
            return Ok(DepotConfig::Local { root: root.into() });
        }

        let Some(base_url) = get(DEPOT_REMOTE_URL) else {
            return Err(ConfigError::NoDepot {
                local: DEPOT_LOCAL_DIR,
                remote: DEPOT_REMOTE_URL,
            });
        };
        Ok(DepotConfig::Remote {
            base_url,
            root: get(DEPOT_REMOTE_ROOT).unwrap_or_default(),
            credentials: Credentials {
                username: require(DEPOT_REMOTE_USER)?,
                password: require(DEPOT_REMOTE_PASSWORD)?,
            },
        })
    }

    pub fn trace_loaded(&self) {
        match self {
            DepotConfig::Local { root } => {
                info!(root = %root.display(), "Using local depot");
            }
            DepotConfig::Remote {
                base_url,
                root,
                credentials,
            } => {
                info!(
                    base_url = %base_url,
                    root = %root,
                    user = %credentials.username,
                    "Using remote depot"
                );
            }
        }
        debug!(?self, "Depot config loaded (full debug)");
    }

    /// Construct the configured depot.
    pub fn build(&self) -> Result<Box<dyn Depot>, DepotError> {
        Ok(match self {
            DepotConfig::Local { root } => Box::new(LocalDepot::new(root.clone())),
            DepotConfig::Remote {
                base_url,
                root,
                credentials,
            } => Box::new(RemoteDepot::new(base_url, root, credentials.clone())?),
        })
    }
}
