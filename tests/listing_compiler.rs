use std::time::Duration;

use listing_depot_core::compile::{CompileError, ListingCompiler, INDEX_LISTING};
use listing_depot_core::compress::CompressionScheme;
use listing_depot_core::contract::{Depot, DepotExt};
use listing_depot_core::descriptor::{sha256_hex, DepotIndex, ListingDescriptor, INDEX_NAME};
use listing_depot_core::local_depot::LocalDepot;
use listing_depot_core::synchronise::{index_path, synchronise};
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Payload {
    name: String,
    versions: Vec<String>,
    stable: bool,
}

fn payload() -> Payload {
    Payload {
        name: "neoforge".into(),
        versions: vec!["21.1.72-beta".into(), "21.1.73".into()],
        stable: true,
    }
}

#[tokio::test]
async fn compressed_artifacts_decompress_to_the_plain_json() {
    let out = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), false);
    compiler.register("loaders", payload()).unwrap();
    let compiled = compiler.finalize().await.unwrap();

    let listing = compiled.get("loaders").expect("loaders listing compiled");
    let plain = std::fs::read(out.path().join("loaders.json")).unwrap();
    let brotli = std::fs::read(out.path().join("loaders.json.br")).unwrap();
    let gzip = std::fs::read(out.path().join("loaders.json.gz")).unwrap();

    assert_eq!(CompressionScheme::Brotli.decompress(&brotli).unwrap(), plain);
    assert_eq!(CompressionScheme::Gzip.decompress(&gzip).unwrap(), plain);

    let back: Payload = serde_json::from_slice(&plain).unwrap();
    assert_eq!(back, payload());
    assert_eq!(listing.file.url, "loaders.json");
    assert_eq!(listing.brotli.url, "loaders.json.br");
    assert_eq!(listing.gzip.url, "loaders.json.gz");
}

#[tokio::test]
async fn descriptors_hash_the_bytes_on_disk() {
    let out = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), true);
    compiler.register("a", payload()).unwrap();
    compiler.register("b", vec![1, 2, 3]).unwrap();
    let compiled = compiler.finalize().await.unwrap();

    for listing in compiled.listings() {
        for file in listing.artifacts() {
            let bytes = std::fs::read(out.path().join(&file.url)).unwrap();
            assert_eq!(file.size, bytes.len() as u64, "size of {}", file.url);
            assert_eq!(file.sha256, sha256_hex(&bytes), "sha256 of {}", file.url);
        }
    }
}

#[tokio::test]
async fn pretty_toggle_controls_formatting() {
    let compact_dir = tempdir().unwrap();
    let pretty_dir = tempdir().unwrap();

    let mut compact = ListingCompiler::new(compact_dir.path(), false);
    compact.register("a", payload()).unwrap();
    compact.finalize().await.unwrap();

    let mut pretty = ListingCompiler::new(pretty_dir.path(), true);
    pretty.register("a", payload()).unwrap();
    pretty.finalize().await.unwrap();

    let compact = std::fs::read_to_string(compact_dir.path().join("a.json")).unwrap();
    let pretty = std::fs::read_to_string(pretty_dir.path().join("a.json")).unwrap();
    assert!(!compact.contains('\n'));
    assert!(pretty.contains("\n  \"name\""));
    assert_eq!(
        serde_json::from_str::<Payload>(&compact).unwrap(),
        serde_json::from_str::<Payload>(&pretty).unwrap()
    );
}

#[tokio::test]
async fn duplicate_registration_fails_fast_and_keeps_the_first() {
    let out = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), false);
    compiler.register("a", payload()).unwrap();

    let err = compiler.register("a", vec!["other"]).unwrap_err();
    assert!(matches!(err, CompileError::DuplicateListing(ref name) if name == "a"));

    let compiled = compiler.finalize().await.unwrap();
    let written: Payload =
        serde_json::from_slice(&std::fs::read(out.path().join("a.json")).unwrap()).unwrap();
    assert_eq!(written, payload());
    assert_eq!(compiled.listings().len(), 2, "a + index");
}

#[tokio::test]
async fn index_cannot_be_registered_by_callers() {
    let out = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), false);
    compiler.register(INDEX_LISTING, payload()).unwrap();

    let err = compiler.finalize().await.unwrap_err();
    assert!(matches!(err, CompileError::DuplicateListing(ref name) if name == INDEX_LISTING));
}

#[tokio::test]
async fn unsafe_names_are_rejected() {
    let out = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), false);

    let err = compiler.register("../escape", payload()).unwrap_err();
    assert!(matches!(err, CompileError::UnsafeName(_)));
    assert_eq!(compiler.registered().count(), 0);
}

#[tokio::test]
async fn depot_index_name_is_reserved() {
    let out = tempdir().unwrap();
    let depot_dir = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), false);

    let err = compiler
        .register(INDEX_NAME, serde_json::json!({"x": 1}))
        .unwrap_err();
    assert!(matches!(err, CompileError::ReservedName(ref name) if name == INDEX_NAME));
    assert_eq!(compiler.registered().count(), 0);

    compiler.register("a", payload()).unwrap();
    let compiled = compiler.finalize().await.unwrap();

    let depot = LocalDepot::new(depot_dir.path());
    synchronise(&depot, &compiled, true).await.unwrap();

    // Every published entry describes the bytes actually stored at its URL.
    let index: DepotIndex = depot.read_json(&index_path()).await.unwrap().unwrap();
    let names: Vec<_> = index.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["a", "index"]);
    for listing in &index {
        for file in listing.artifacts() {
            let stored = depot.read(&file.url).await.unwrap().expect("artifact published");
            assert!(file.matches(&stored), "{} matches its descriptor", file.url);
        }
    }
}

#[tokio::test]
async fn pending_payloads_complete_in_any_order() {
    let out = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), false);

    compiler
        .register_with("slow", async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, std::io::Error>(vec!["slow"])
        })
        .unwrap();
    compiler
        .register_with("fast", async { Ok::<_, std::io::Error>(vec!["fast"]) })
        .unwrap();

    let compiled = compiler.finalize().await.unwrap();
    assert!(compiled.get("slow").is_some());
    assert!(compiled.get("fast").is_some());

    let index = compiled.get(INDEX_LISTING).expect("index listing written");
    let summary: Vec<ListingDescriptor> =
        serde_json::from_slice(&std::fs::read(out.path().join(&index.file.url)).unwrap()).unwrap();
    let mut names: Vec<_> = summary.iter().map(|l| l.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["fast", "slow"]);
}

#[tokio::test]
async fn every_listing_shares_the_build_epoch() {
    let out = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), false);
    let epoch = compiler.writer().epoch();
    compiler.register("a", 1).unwrap();
    compiler.register("b", 2).unwrap();

    let compiled = compiler.finalize().await.unwrap();
    assert!(compiled.listings().iter().all(|l| l.last_modified == epoch));
}

#[tokio::test]
async fn failed_payload_aborts_finalize() {
    let out = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), false);
    compiler.register("good", payload()).unwrap();
    compiler
        .register_with("bad", async {
            Err::<Payload, _>(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "upstream went away",
            ))
        })
        .unwrap();

    let err = compiler.finalize().await.unwrap_err();
    assert!(matches!(err, CompileError::Payload { ref name, .. } if name == "bad"));
    assert!(!out.path().join("index.json").exists());
}

#[tokio::test]
async fn non_string_map_keys_fail_serialization() {
    use std::collections::HashMap;

    let out = tempdir().unwrap();
    let mut compiler = ListingCompiler::new(out.path(), false);
    let mut payload = HashMap::new();
    payload.insert(vec![1u8], "not a JSON object key");
    compiler.register("broken", payload).unwrap();

    let err = compiler.finalize().await.unwrap_err();
    assert!(matches!(err, CompileError::Serialize { ref name, .. } if name == "broken"));
}
