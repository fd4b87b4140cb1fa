//! Artifact compressor: every configured scheme runs concurrently over the same input.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::future::try_join_all;
use tracing::debug;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW: u32 = 22;

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("{scheme} compression failed: {source}")]
    Io {
        scheme: CompressionScheme,
        #[source]
        source: std::io::Error,
    },

    #[error("compression task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A lossless compression scheme, keyed by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompressionScheme {
    /// High-ratio scheme for at-rest storage.
    Brotli,
    /// Widely supported scheme for client compatibility.
    Gzip,
}

impl CompressionScheme {
    pub const ALL: [CompressionScheme; 2] = [CompressionScheme::Brotli, CompressionScheme::Gzip];

    pub fn tag(self) -> &'static str {
        match self {
            CompressionScheme::Brotli => "brotli",
            CompressionScheme::Gzip => "gzip",
        }
    }

    /// File extension appended after `.json`.
    pub fn extension(self) -> &'static str {
        match self {
            CompressionScheme::Brotli => "br",
            CompressionScheme::Gzip => "gz",
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        let io = |source: std::io::Error| CompressError::Io {
            scheme: self,
            source,
        };
        match self {
            CompressionScheme::Brotli => {
                let mut writer = brotli::CompressorWriter::new(
                    Vec::new(),
                    BROTLI_BUFFER_SIZE,
                    BROTLI_QUALITY,
                    BROTLI_WINDOW,
                );
                writer.write_all(data).map_err(io)?;
                Ok(writer.into_inner())
            }
            CompressionScheme::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
                encoder.write_all(data).map_err(io)?;
                encoder.finish().map_err(io)
            }
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        let mut out = Vec::new();
        let result = match self {
            CompressionScheme::Brotli => {
                brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE).read_to_end(&mut out)
            }
            CompressionScheme::Gzip => GzDecoder::new(data).read_to_end(&mut out),
        };
        result.map_err(|source| CompressError::Io {
            scheme: self,
            source,
        })?;
        Ok(out)
    }
}

impl fmt::Display for CompressionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Compress `data` with every scheme in parallel. The map is only returned once all
/// schemes have finished.
pub async fn compress_all(
    data: Arc<[u8]>,
) -> Result<BTreeMap<CompressionScheme, Vec<u8>>, CompressError> {
    let tasks = CompressionScheme::ALL.into_iter().map(|scheme| {
        let data = Arc::clone(&data);
        tokio::task::spawn_blocking(move || scheme.compress(&data).map(|bytes| (scheme, bytes)))
    });

    let mut compressed = BTreeMap::new();
    for result in try_join_all(tasks).await? {
        let (scheme, bytes) = result?;
        debug!(scheme = %scheme, input = data.len(), output = bytes.len(), "Compressed artifact");
        compressed.insert(scheme, bytes);
    }
    Ok(compressed)
}
