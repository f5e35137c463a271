use std::fs;
use tracing::{info, warn};

use crate::error::{Result, StemError};
use crate::io::{
    crypto::verify_sha256,
    net::{download_to, http_client},
    paths::models_cache_dir,
};
use crate::model::{registry::resolve_manifest_url, ModelHandle};
use crate::types::ModelManifest;

/// Fetch a model's manifest and make sure its artifact sits verified in the
/// local cache, downloading it if missing or corrupt.
pub fn ensure_model(model_name: &str, manifest_url_override: Option<&str>) -> Result<ModelHandle> {
    let manifest_url = match manifest_url_override {
        Some(url) => url.to_string(),
        None => resolve_manifest_url(model_name)?,
    };

    let client = http_client()?;
    let manifest: ModelManifest = client
        .get(&manifest_url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| StemError::model_load(format!("fetching manifest {manifest_url}: {e}")))?
        .json()
        .map_err(|e| StemError::model_load(format!("parsing manifest {manifest_url}: {e}")))?;

    let artifact = manifest.primary_artifact()?.clone();
    if artifact.sha256.len() < 8 {
        return Err(StemError::model_load(format!(
            "manifest `{}` carries a malformed sha256",
            manifest.name
        )));
    }

    let cache_dir = models_cache_dir()?;
    fs::create_dir_all(&cache_dir)?;

    let ext = artifact
        .file
        .rsplit('.')
        .next()
        .map(|s| format!(".{s}"))
        .unwrap_or_default();
    let file_name = format!("{}-{}{}", manifest.name, &artifact.sha256[..8], ext);
    let local_path = cache_dir.join(file_name);

    let cached = matches!(verify_sha256(&local_path, &artifact.sha256), Ok(true));
    if cached {
        info!(model = %manifest.name, path = %local_path.display(), "model artifact cached");
    } else {
        download_to(&client, &artifact.url, &local_path)?;
        if !verify_sha256(&local_path, &artifact.sha256)? {
            fs::remove_file(&local_path).ok();
            return Err(StemError::model_load(format!(
                "checksum mismatch for {}",
                local_path.display()
            )));
        }
        if artifact.size_bytes > 0 {
            let size = fs::metadata(&local_path).map(|m| m.len()).unwrap_or(0);
            if size != artifact.size_bytes {
                warn!(
                    path = %local_path.display(),
                    expected = artifact.size_bytes,
                    actual = size,
                    "artifact size differs from manifest"
                );
            }
        }
    }

    Ok(ModelHandle {
        manifest,
        local_path,
    })
}
