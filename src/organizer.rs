//! Maps raw model sources into the stems offered to the user.
//!
//! This is the only component with decision logic: 4-stem passes every
//! source through unchanged, 2-stem keeps `vocals` and folds everything
//! else into a single `accompaniment` track.

use ndarray::Array2;

use crate::error::{Result, StemError};
use crate::types::{SeparationResult, StemConfig, StemMapping, VOCALS};

/// Output key for the summed non-vocal sources in 2-stem mode.
pub const ACCOMPANIMENT: &str = "accompaniment";

/// Arrange a separation result into named output stems.
///
/// Pure function of its inputs; the result is left untouched. The source
/// list must be non-empty and shape-consistent (the model host guarantees
/// both, but they are checked, not assumed).
pub fn organize(result: &SeparationResult, config: StemConfig) -> Result<StemMapping> {
    if result.is_empty() {
        return Err(StemError::inference("separation produced no sources"));
    }
    check_shapes(result)?;

    let mut mapping = StemMapping::new();
    match config {
        StemConfig::FourStem => {
            for (name, buffer) in result.iter() {
                mapping.insert(name, buffer.clone());
            }
        }
        StemConfig::TwoStem => {
            let vocals = result.get(VOCALS).ok_or_else(|| StemError::Configuration {
                config: config.to_string(),
                missing: VOCALS.to_string(),
            })?;

            let mut sum = Array2::<f32>::zeros(vocals.data.raw_dim());
            for (name, buffer) in result.iter() {
                if name != VOCALS {
                    sum += &buffer.data;
                }
            }

            mapping.insert(VOCALS, vocals.clone());
            mapping.insert(
                ACCOMPANIMENT,
                crate::types::AudioBuffer::new(sum, vocals.sample_rate),
            );
        }
    }
    Ok(mapping)
}

/// Every source must share one shape and sample rate; anything else means
/// the model host broke its contract.
fn check_shapes(result: &SeparationResult) -> Result<()> {
    let mut iter = result.iter();
    let (first_name, first) = iter.next().expect("checked non-empty");
    for (name, buffer) in iter {
        if buffer.data.dim() != first.data.dim() || buffer.sample_rate != first.sample_rate {
            return Err(StemError::inference(format!(
                "source `{name}` does not match `{first_name}`: {:?}@{} vs {:?}@{}",
                buffer.data.dim(),
                buffer.sample_rate,
                first.data.dim(),
                first.sample_rate,
            )));
        }
    }
    Ok(())
}
