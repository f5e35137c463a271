use directories::ProjectDirs;
use std::path::PathBuf;

use crate::error::{Result, StemError};

/// Per-user cache directory for downloaded model artifacts.
pub fn models_cache_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "StemStudio", "stem-studio")
        .ok_or_else(|| StemError::model_load("no cache directory available on this platform"))?;
    Ok(proj.cache_dir().join("models"))
}
