//! Signal conditioning between the decoded upload and the model input.

use ndarray::Array2;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::error::{Result, StemError};
use crate::types::AudioBuffer;

/// Conform a decoded buffer to the two channels the model expects.
///
/// Mono is duplicated onto both channels; anything beyond stereo is
/// rejected rather than guessed at.
pub fn conform_stereo(audio: &AudioBuffer) -> Result<AudioBuffer> {
    match audio.channels() {
        2 => Ok(audio.clone()),
        1 => {
            let mono = audio.data.row(0);
            let mut data = Array2::<f32>::zeros((2, audio.frames()));
            data.row_mut(0).assign(&mono);
            data.row_mut(1).assign(&mono);
            Ok(AudioBuffer::new(data, audio.sample_rate))
        }
        n => Err(StemError::inference(format!(
            "unsupported channel count {n} (expected mono or stereo)"
        ))),
    }
}

/// Sinc-resample a buffer to `to_rate`. No-op when the rates already match.
pub fn resample(audio: &AudioBuffer, to_rate: u32) -> Result<AudioBuffer> {
    if audio.sample_rate == to_rate {
        return Ok(audio.clone());
    }
    let from_rate = audio.sample_rate;
    let channels = audio.channels();
    let frames = audio.frames();

    debug!(from_rate, to_rate, frames, "resampling input");

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        frames,
        channels,
    )
    .map_err(|e| StemError::inference(format!("resampler init: {e}")))?;

    let input: Vec<Vec<f32>> = (0..channels)
        .map(|ch| audio.data.row(ch).to_vec())
        .collect();
    let output = resampler
        .process(&input, None)
        .map_err(|e| StemError::inference(format!("resampling: {e}")))?;

    let out_frames = output.iter().map(|c| c.len()).min().unwrap_or(0);
    let mut data = Array2::<f32>::zeros((channels, out_frames));
    for (ch, samples) in output.iter().enumerate() {
        for (i, &s) in samples.iter().take(out_frames).enumerate() {
            data[[ch, i]] = s;
        }
    }

    Ok(AudioBuffer::new(data, to_rate))
}

/// Per-frame blend weights for one inference chunk.
///
/// Triangular ramps over the overlap region on whichever sides adjoin a
/// neighboring chunk; interior frames keep full weight. Accumulating
/// `sample * weight` and dividing by the summed weights reassembles the
/// chunks without seams.
pub fn fade_weights(chunk_len: usize, overlap: usize, is_first: bool, is_last: bool) -> Vec<f32> {
    let mut weights = vec![1.0f32; chunk_len];
    if overlap == 0 || chunk_len == 0 {
        return weights;
    }
    let ramp = overlap.min(chunk_len);
    if !is_first {
        for (i, w) in weights.iter_mut().take(ramp).enumerate() {
            *w = (i + 1) as f32 / (ramp + 1) as f32;
        }
    }
    if !is_last {
        for i in 0..ramp {
            let idx = chunk_len - 1 - i;
            weights[idx] = weights[idx].min((i + 1) as f32 / (ramp + 1) as f32);
        }
    }
    weights
}
