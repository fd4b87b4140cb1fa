//! Content-addressed descriptors for published artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Well-known depot path of the published index, without the `.json` suffix.
pub const INDEX_NAME: &str = ".depot-index";

/// One physical artifact: where it lives and what its bytes hash to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub url: String,
    pub size: u64,
    pub sha256: String,
}

impl FileDescriptor {
    /// Describe `bytes` as published at `url`.
    pub fn of(url: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            url: url.into(),
            size: bytes.len() as u64,
            sha256: sha256_hex(bytes),
        }
    }

    /// True when `bytes` are exactly the content this descriptor was built from.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.size == bytes.len() as u64 && self.sha256 == sha256_hex(bytes)
    }
}

/// One logical listing, published as plain JSON plus one artifact per compression scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDescriptor {
    pub name: String,
    pub last_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub file: FileDescriptor,
    pub brotli: FileDescriptor,
    pub gzip: FileDescriptor,
}

impl ListingDescriptor {
    /// Every physical artifact of this listing, uncompressed first.
    pub fn artifacts(&self) -> [&FileDescriptor; 3] {
        [&self.file, &self.brotli, &self.gzip]
    }

    /// Same name and identical uncompressed content.
    pub fn same_content(&self, other: &ListingDescriptor) -> bool {
        self.name == other.name
            && self.file.sha256 == other.file.sha256
            && self.file.size == other.file.size
    }
}

/// The published state of a depot: one descriptor per listing, sorted by name.
pub type DepotIndex = Vec<ListingDescriptor>;

/// Relative path of the uncompressed artifact for listing `name`.
pub fn json_path(name: &str) -> String {
    format!("{name}.json")
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_hashes_exact_bytes() {
        let file = FileDescriptor::of("a.json", b"{}");
        assert_eq!(file.size, 2);
        assert_eq!(
            file.sha256,
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert!(file.matches(b"{}"));
        assert!(!file.matches(b"{ }"));
    }

    #[test]
    fn listing_serializes_flat_uncompressed_fields() {
        let listing = ListingDescriptor {
            name: "a".into(),
            last_modified: DateTime::from_timestamp(0, 0).unwrap(),
            file: FileDescriptor::of("a.json", b"1"),
            brotli: FileDescriptor::of("a.json.br", b"2"),
            gzip: FileDescriptor::of("a.json.gz", b"3"),
        };
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value["url"], "a.json");
        assert_eq!(value["size"], 1);
        assert_eq!(value["brotli"]["url"], "a.json.br");
        assert_eq!(value["last_modified"], "1970-01-01T00:00:00Z");

        let back: ListingDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(back, listing);
    }
}
