//! Depot backed by a directory on the local filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::contract::{Depot, DepotError};

pub struct LocalDepot {
    root: PathBuf,
}

impl LocalDepot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DepotError {
    DepotError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl Depot for LocalDepot {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, DepotError> {
        let full = self.resolve(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %full.display(), "Depot file not found");
                Ok(None)
            }
            Err(e) => Err(io_error(&full, e)),
        }
    }

    async fn write(&self, path: &str, bytes: Vec<u8>) -> Result<(), DepotError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::write(&full, &bytes)
            .await
            .map_err(|e| io_error(&full, e))?;
        debug!(path = %full.display(), size = bytes.len(), "Wrote depot file");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("file://{}", self.resolve(path).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::DepotExt;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let depot = LocalDepot::new(dir.path());
        assert!(depot.read("nothing.json").await.unwrap().is_none());
        let index: Option<Vec<String>> = depot.read_json("nothing.json").await.unwrap();
        assert!(index.is_none());
    }

    #[tokio::test]
    async fn write_creates_missing_parents() {
        let dir = tempdir().unwrap();
        let depot = LocalDepot::new(dir.path().join("depot"));

        depot.write("meta/v2/a.json", b"[1]".to_vec()).await.unwrap();
        depot.write("meta/v2/b.json", b"[2]".to_vec()).await.unwrap();

        assert_eq!(depot.read("meta/v2/a.json").await.unwrap().unwrap(), b"[1]");
        let b: Vec<u32> = depot.read_json("meta/v2/b.json").await.unwrap().unwrap();
        assert_eq!(b, vec![2]);
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let dir = tempdir().unwrap();
        let depot = LocalDepot::new(dir.path());
        depot.write("broken.json", b"{not json".to_vec()).await.unwrap();

        let err = depot.read_json::<Vec<String>>("broken.json").await.unwrap_err();
        assert!(matches!(err, DepotError::Json { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn reading_a_directory_is_an_io_error() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("folder.json")).unwrap();
        let depot = LocalDepot::new(dir.path());

        let err = depot.read("folder.json").await.unwrap_err();
        assert!(matches!(err, DepotError::Io { .. }), "got {err:?}");
    }

    #[test]
    fn public_url_points_into_root() {
        let depot = LocalDepot::new("/srv/depot");
        assert_eq!(depot.public_url("index.json"), "file:///srv/depot/index.json");
    }
}
