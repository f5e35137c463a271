use httpmock::prelude::*;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use tempfile::tempdir;

use stem_studio::ensure_model;

// Both tests point XDG_CACHE_HOME at their own tempdir; serialize them so
// the process-wide env var never flips mid-test.
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn fake_model_bytes(len: usize, seed: u64) -> (Vec<u8>, String) {
    let mut data = vec![0u8; len];
    let mut rng = StdRng::seed_from_u64(seed);
    rng.fill_bytes(&mut data);

    let mut hasher = Sha256::new();
    hasher.update(&data);
    (data, hex::encode(hasher.finalize()))
}

fn manifest_json(name: &str, file: &str, url: &str, sha256: &str, size: u64) -> String {
    format!(
        r#"{{
  "name": "{name}",
  "version": "1.0.0",
  "backend": "onnx",
  "sample_rate": 44100,
  "window": 441000,
  "hop": 220500,
  "stems": ["vocals", "drums", "bass", "other"],
  "input_layout": "BCT",
  "output_layout": "BSCT",
  "artifacts": [
    {{
      "file": "{file}",
      "url": "{url}",
      "sha256": "{sha256}",
      "size_bytes": {size}
    }}
  ]
}}"#
    )
}

#[test]
fn downloads_then_reuses_the_cache() {
    let _env = ENV_LOCK.lock().unwrap();
    let cache = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", cache.path());

    let (bytes, sha) = fake_model_bytes(256 * 1024, 7);
    let server = MockServer::start();

    let model_mock = server.mock(|when, then| {
        when.method(GET).path("/net_4stem.onnx");
        then.status(200)
            .header("Content-Length", bytes.len().to_string().as_str())
            .body(bytes.clone());
    });
    let manifest_mock = server.mock(|when, then| {
        when.method(GET).path("/net_4stem.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_json(
                "net_4stem",
                "net_4stem.onnx",
                &format!("{}/net_4stem.onnx", server.base_url()),
                &sha,
                bytes.len() as u64,
            ));
    });

    let manifest_url = format!("{}/net_4stem.json", server.base_url());

    let first = ensure_model("ignored", Some(&manifest_url)).expect("first ensure_model");
    assert!(first.local_path.exists());
    assert_eq!(first.manifest.stems.len(), 4);

    let second = ensure_model("ignored", Some(&manifest_url)).expect("second ensure_model");
    assert_eq!(first.local_path, second.local_path, "cache path is stable");

    assert!(manifest_mock.hits() >= 2);
    model_mock.assert_hits(1);
}

#[test]
fn checksum_mismatch_is_rejected_and_nothing_is_cached() {
    let _env = ENV_LOCK.lock().unwrap();
    let cache = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", cache.path());

    let (bytes, sha) = fake_model_bytes(64 * 1024, 11);
    let mut wrong_sha = sha.clone();
    let flipped = if &wrong_sha[0..1] == "a" { "b" } else { "a" };
    wrong_sha.replace_range(0..1, flipped);

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bad.onnx");
        then.status(200)
            .header("Content-Length", bytes.len().to_string().as_str())
            .body(bytes.clone());
    });
    server.mock(|when, then| {
        when.method(GET).path("/bad.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_json(
                "bad_model",
                "bad.onnx",
                &format!("{}/bad.onnx", server.base_url()),
                &wrong_sha,
                bytes.len() as u64,
            ));
    });

    let manifest_url = format!("{}/bad.json", server.base_url());
    let err = ensure_model("ignored", Some(&manifest_url)).unwrap_err();
    let msg = err.to_string().to_lowercase();
    assert!(msg.contains("checksum"), "expected checksum error, got: {msg}");

    // The failed artifact must not be left behind to poison later runs.
    let leftovers: Vec<_> = walk_files(cache.path())
        .into_iter()
        .filter(|p| p.extension().map(|e| e == "onnx").unwrap_or(false))
        .collect();
    assert!(leftovers.is_empty(), "stale artifacts: {leftovers:?}");
}

fn walk_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk_files(&path));
        } else {
            out.push(path);
        }
    }
    out
}
