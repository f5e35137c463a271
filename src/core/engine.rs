//! ONNX Runtime model host.
//!
//! Drives time-domain separation models: input `[1, 2, T]` (batch,
//! channels, samples), output `[1, S, 2, T]` with one slab per source in
//! manifest order. Long inputs are processed as overlapping windows and
//! blended back together.

use ndarray::{Array2, Array3};
use once_cell::sync::OnceCell;
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::{Tensor, Value},
};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::core::dsp::fade_weights;
use crate::error::{Result, StemError};
use crate::model::{ModelHandle, Separator};
use crate::types::{AudioBuffer, ModelManifest, SeparationResult};

static ORT_INIT: OnceCell<()> = OnceCell::new();

pub struct OnnxSeparator {
    session: Mutex<Session>,
    manifest: ModelManifest,
    input_name: String,
}

impl OnnxSeparator {
    /// Build a session for a cached model artifact.
    pub fn load(handle: &ModelHandle) -> Result<Self> {
        validate_manifest(&handle.manifest)?;

        ORT_INIT.get_or_try_init::<_, StemError>(|| {
            ort::init()
                .commit()
                .map_err(|e| StemError::model_load(format!("onnxruntime init: {e}")))?;
            Ok(())
        })?;

        let session = SessionBuilder::new()
            .map_err(|e| StemError::model_load(format!("session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| StemError::model_load(format!("session options: {e}")))?
            .commit_from_file(&handle.local_path)
            .map_err(|e| {
                StemError::model_load(format!(
                    "loading {}: {e}",
                    handle.local_path.display()
                ))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| StemError::model_load("model declares no inputs"))?;

        info!(
            model = %handle.manifest.name,
            version = %handle.manifest.version,
            sources = ?handle.manifest.stems,
            "model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            manifest: handle.manifest.clone(),
            input_name,
        })
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }

    /// Run one window through the session: `[2, T]` planar in,
    /// `[S, 2, T]` out.
    fn run_window(&self, left: &[f32], right: &[f32]) -> Result<Array3<f32>> {
        let t = left.len();
        let sources = self.manifest.stems.len();

        let mut planar = Vec::with_capacity(2 * t);
        planar.extend_from_slice(left);
        planar.extend_from_slice(right);
        let input: Value = Tensor::from_array((vec![1usize, 2, t], planar))
            .map_err(|e| StemError::inference(format!("input tensor: {e}")))?
            .into_dyn();

        let mut session = self
            .session
            .lock()
            .map_err(|_| StemError::inference("inference session lock poisoned"))?;

        let outputs = session
            .run(vec![(self.input_name.clone(), input)])
            .map_err(|e| StemError::inference(format!("session run: {e}")))?;

        let output = outputs
            .into_iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| StemError::inference("model returned no outputs"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| StemError::inference(format!("output tensor: {e}")))?;
        let shape: Vec<i64> = shape.iter().copied().collect();

        validate_output_shape(&shape, sources, t, data.len())?;
        Ok(extract_sources(data, sources, t))
    }
}

impl Separator for OnnxSeparator {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn source_names(&self) -> &[String] {
        &self.manifest.stems
    }

    fn sample_rate(&self) -> u32 {
        self.manifest.sample_rate
    }

    fn separate(&self, input: &AudioBuffer) -> Result<SeparationResult> {
        if input.channels() != 2 {
            return Err(StemError::inference(format!(
                "expected stereo input, got {} channels",
                input.channels()
            )));
        }
        let frames = input.frames();
        if frames == 0 {
            return Err(StemError::inference("empty audio input"));
        }
        if input.sample_rate != self.manifest.sample_rate {
            return Err(StemError::inference(format!(
                "input at {} Hz, model expects {} Hz",
                input.sample_rate, self.manifest.sample_rate
            )));
        }

        let window = self.manifest.window;
        let step = self.manifest.hop;
        let overlap = window - step;
        let sources = self.manifest.stems.len();

        let mut acc = Array3::<f32>::zeros((sources, 2, frames));
        let mut weight_sum = vec![0f32; frames];
        let mut left = vec![0f32; window];
        let mut right = vec![0f32; window];

        let mut pos = 0usize;
        let mut window_idx = 0usize;
        loop {
            let end = (pos + window).min(frames);
            let len = end - pos;
            for i in 0..window {
                if i < len {
                    left[i] = input.data[[0, pos + i]];
                    right[i] = input.data[[1, pos + i]];
                } else {
                    left[i] = 0.0;
                    right[i] = 0.0;
                }
            }

            let out = self.run_window(&left, &right)?;
            window_idx += 1;
            debug!(window = window_idx, pos, frames, "inference window done");

            let weights = fade_weights(len, overlap, pos == 0, end == frames);
            for s in 0..sources {
                for c in 0..2 {
                    for i in 0..len {
                        acc[[s, c, pos + i]] += out[[s, c, i]] * weights[i];
                    }
                }
            }
            for i in 0..len {
                weight_sum[pos + i] += weights[i];
            }

            if end == frames {
                break;
            }
            pos += step;
        }

        for i in 0..frames {
            let w = weight_sum[i];
            if w > 1e-8 {
                for s in 0..sources {
                    for c in 0..2 {
                        acc[[s, c, i]] /= w;
                    }
                }
            }
        }

        let mut result = SeparationResult::new();
        for (idx, name) in self.manifest.stems.iter().enumerate() {
            let mut data = Array2::<f32>::zeros((2, frames));
            for c in 0..2 {
                for i in 0..frames {
                    data[[c, i]] = acc[[idx, c, i]];
                }
            }
            result.push(name, AudioBuffer::new(data, self.manifest.sample_rate));
        }
        Ok(result)
    }
}

fn validate_manifest(mf: &ModelManifest) -> Result<()> {
    if mf.backend != "onnx" {
        return Err(StemError::model_load(format!(
            "unsupported backend `{}` in manifest `{}`",
            mf.backend, mf.name
        )));
    }
    if mf.sample_rate == 0 {
        return Err(StemError::model_load("manifest sample_rate is zero"));
    }
    if mf.window == 0 || mf.hop == 0 || mf.hop > mf.window {
        return Err(StemError::model_load(format!(
            "bad window geometry: window={} hop={}",
            mf.window, mf.hop
        )));
    }
    if mf.stems.is_empty() {
        return Err(StemError::model_load("manifest declares no sources"));
    }
    if mf.input_layout != "BCT" || mf.output_layout != "BSCT" {
        return Err(StemError::model_load(format!(
            "unsupported tensor layouts {}/{}",
            mf.input_layout, mf.output_layout
        )));
    }
    Ok(())
}

/// Expect `[1, S, 2, T]` exactly; anything else is a model contract breach.
pub fn validate_output_shape(
    shape: &[i64],
    expected_sources: usize,
    expected_frames: usize,
    data_len: usize,
) -> Result<()> {
    if shape.len() != 4 {
        return Err(StemError::inference(format!(
            "expected 4-D output, got shape {shape:?}"
        )));
    }
    if shape[0] != 1 {
        return Err(StemError::inference(format!(
            "expected batch 1, got shape {shape:?}"
        )));
    }
    if shape[1] != expected_sources as i64 {
        return Err(StemError::inference(format!(
            "expected {expected_sources} sources, got shape {shape:?}"
        )));
    }
    if shape[2] != 2 {
        return Err(StemError::inference(format!(
            "expected stereo output, got shape {shape:?}"
        )));
    }
    if shape[3] != expected_frames as i64 {
        return Err(StemError::inference(format!(
            "expected {expected_frames} frames, got shape {shape:?}"
        )));
    }
    let expected_len = expected_sources * 2 * expected_frames;
    if data_len != expected_len {
        return Err(StemError::inference(format!(
            "output buffer holds {data_len} values, shape {shape:?} implies {expected_len}"
        )));
    }
    Ok(())
}

/// Slice a flat row-major `[1, S, 2, T]` buffer into per-source planar
/// arrays. Length must have been validated against the shape.
pub fn extract_sources(data: &[f32], sources: usize, frames: usize) -> Array3<f32> {
    let mut out = Array3::<f32>::zeros((sources, 2, frames));
    for s in 0..sources {
        for c in 0..2 {
            let offset = (s * 2 + c) * frames;
            for i in 0..frames {
                out[[s, c, i]] = data[offset + i];
            }
        }
    }
    out
}
