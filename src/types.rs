use ndarray::Array2;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StemError};

/// Source name the 2-stem configuration pivots on.
pub const VOCALS: &str = "vocals";

/// Planar multi-channel waveform: `data[[channel, frame]]` at a fixed rate.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub data: Array2<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(data: Array2<f32>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    pub fn silent(channels: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            data: Array2::zeros((channels, frames)),
            sample_rate,
        }
    }

    pub fn channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn frames(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Ordered per-source output of one inference call. Source names are unique;
/// all buffers share the conformed input's shape and sample rate.
#[derive(Clone, Debug, Default)]
pub struct SeparationResult {
    sources: Vec<(String, AudioBuffer)>,
}

impl SeparationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sources(sources: Vec<(String, AudioBuffer)>) -> Self {
        Self { sources }
    }

    pub fn push(&mut self, name: impl Into<String>, buffer: AudioBuffer) {
        self.sources.push((name.into(), buffer));
    }

    pub fn get(&self, name: &str) -> Option<&AudioBuffer> {
        self.sources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AudioBuffer)> {
        self.sources.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Which stems the user asked for.
///
/// A closed set so a missing match arm is a compile error, not a silently
/// ignored configuration string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StemConfig {
    /// `vocals` + `accompaniment` (everything else summed).
    TwoStem,
    /// One stem per model source, passed through unchanged.
    FourStem,
}

impl StemConfig {
    pub const ALL: [StemConfig; 2] = [StemConfig::TwoStem, StemConfig::FourStem];

    pub fn as_str(&self) -> &'static str {
        match self {
            StemConfig::TwoStem => "2stem",
            StemConfig::FourStem => "4stem",
        }
    }
}

impl fmt::Display for StemConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StemConfig {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "2stem" => Ok(StemConfig::TwoStem),
            "4stem" => Ok(StemConfig::FourStem),
            other => Err(format!(
                "unknown stem configuration `{other}` (expected 2stem or 4stem)"
            )),
        }
    }
}

/// Named output stems of one user action, in presentation order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StemMapping {
    stems: Vec<(String, AudioBuffer)>,
}

impl StemMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, buffer: AudioBuffer) {
        self.stems.push((name.into(), buffer));
    }

    pub fn get(&self, name: &str) -> Option<&AudioBuffer> {
        self.stems.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AudioBuffer)> {
        self.stems.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stems.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}

/// One downloadable model artifact listed in a manifest.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelArtifact {
    pub file: String,
    pub url: String,
    pub sha256: String,
    #[serde(default)]
    pub size_bytes: u64,
}

/// Fetched description of a pretrained separation model.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    pub version: String,
    pub backend: String,
    pub sample_rate: u32,
    pub window: usize,
    pub hop: usize,
    pub stems: Vec<String>,
    pub input_layout: String,
    pub output_layout: String,
    pub artifacts: Vec<ModelArtifact>,
}

impl ModelManifest {
    /// The artifact holding the network weights. Manifests ship exactly one
    /// today; the first entry wins if that ever changes.
    pub fn primary_artifact(&self) -> Result<&ModelArtifact> {
        self.artifacts.first().ok_or_else(|| {
            StemError::model_load(format!("manifest `{}` lists no artifacts", self.name))
        })
    }
}
