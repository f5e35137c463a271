use serde::Deserialize;

use crate::error::{Result, StemError};

#[derive(Debug, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub manifest: String,
}

#[derive(Debug, Deserialize)]
pub struct Registry {
    pub default: String,
    pub models: Vec<RegistryEntry>,
}

const REGISTRY_JSON: &str = include_str!("../../models/registry.json");

pub fn load_registry() -> Result<Registry> {
    serde_json::from_str(REGISTRY_JSON)
        .map_err(|e| StemError::model_load(format!("embedded registry is invalid: {e}")))
}

/// Map a model name (or "" for the default) to its manifest URL.
pub fn resolve_manifest_url(model_name: &str) -> Result<String> {
    let registry = load_registry()?;
    let target = if model_name.is_empty() {
        registry.default
    } else {
        model_name.to_string()
    };

    registry
        .models
        .into_iter()
        .find(|m| m.name == target)
        .map(|m| m.manifest)
        .ok_or_else(|| StemError::model_load(format!("model `{target}` not found in registry")))
}
