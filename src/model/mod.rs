//! Model host: registry lookup, artifact management, and the inference seam.

pub mod manager;
pub mod registry;

use std::path::PathBuf;

use crate::core::engine::OnnxSeparator;
use crate::error::Result;
use crate::types::{AudioBuffer, ModelManifest, SeparationResult};

/// A cached model artifact plus the manifest describing it.
#[derive(Debug)]
pub struct ModelHandle {
    pub manifest: ModelManifest,
    pub local_path: PathBuf,
}

/// The inference seam. One loaded separation model: deterministic for a
/// given input, blocking for the duration of the call.
pub trait Separator: Send + Sync {
    /// Model name, for logs and the health endpoint.
    fn name(&self) -> &str;

    /// Ordered source names this model produces.
    fn source_names(&self) -> &[String];

    /// Sample rate the model was trained at; input is conformed to it.
    fn sample_rate(&self) -> u32;

    /// Split a stereo buffer into one buffer per source, each sharing the
    /// input's shape and sample rate.
    fn separate(&self, input: &AudioBuffer) -> Result<SeparationResult>;
}

/// Resolve, fetch, and load a named model end to end.
pub fn load_model(name: &str, manifest_url_override: Option<&str>) -> Result<OnnxSeparator> {
    let handle = manager::ensure_model(name, manifest_url_override)?;
    OnnxSeparator::load(&handle)
}
