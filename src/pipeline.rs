//! One user action from upload to downloadable stems.
//!
//! Every entry point owns a scoped temporary workspace that is removed on
//! all exit paths, so repeated actions leave nothing behind on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;
use tracing::info;

use crate::core::audio::{is_supported_extension, read_audio, write_wav};
use crate::core::dsp::{conform_stereo, resample};
use crate::error::{Result, StemError};
use crate::model::Separator;
use crate::organizer::organize;
use crate::types::{AudioBuffer, StemConfig, StemMapping};

/// One finished stem held in memory, ready to be offered for download.
#[derive(Clone, Debug)]
pub struct StemArtifact {
    pub name: String,
    pub file_name: String,
    pub data: Vec<u8>,
}

/// One finished stem persisted to disk by the offline path.
#[derive(Clone, Debug)]
pub struct StemFile {
    pub name: String,
    pub path: PathBuf,
}

/// Conform a decoded buffer to the model's expectations and split it.
pub fn split_buffer(
    model: &dyn Separator,
    audio: &AudioBuffer,
    config: StemConfig,
) -> Result<StemMapping> {
    let stereo = conform_stereo(audio)?;
    let conformed = resample(&stereo, model.sample_rate())?;
    let result = model.separate(&conformed)?;
    organize(&result, config)
}

/// Split an uploaded payload, returning encoded WAV bytes per stem.
///
/// The payload is staged in a temporary workspace together with the
/// per-stem WAV files; the workspace is gone by the time this returns,
/// whether it returns stems or an error.
pub fn split_upload(
    model: &dyn Separator,
    payload: &[u8],
    extension: &str,
    config: StemConfig,
) -> Result<Vec<StemArtifact>> {
    if !is_supported_extension(extension) {
        return Err(StemError::decode(
            format!("upload.{extension}"),
            "unsupported file extension",
        ));
    }

    let workspace = tempdir()?;
    let input_path = workspace.path().join(format!("input.{extension}"));
    fs::write(&input_path, payload)?;

    let audio = read_audio(&input_path)?;
    let mapping = split_buffer(model, &audio, config)?;

    let mut artifacts = Vec::with_capacity(mapping.len());
    for (name, buffer) in mapping.iter() {
        let file_name = format!("{name}.wav");
        let path = workspace.path().join(&file_name);
        write_wav(&path, buffer)?;
        artifacts.push(StemArtifact {
            name: name.to_string(),
            file_name,
            data: fs::read(&path)?,
        });
    }

    info!(
        model = model.name(),
        config = %config,
        stems = artifacts.len(),
        "split action complete"
    );
    Ok(artifacts)
}

/// Split a local file into `out_dir`, one WAV per stem.
///
/// Stems are written inside a temporary workspace first and only copied
/// out once the whole mapping encoded cleanly, so a failure never leaves
/// a partial stem set in `out_dir`.
pub fn split_file(
    model: &dyn Separator,
    input: &Path,
    out_dir: &Path,
    config: StemConfig,
) -> Result<Vec<StemFile>> {
    let audio = read_audio(input)?;
    let mapping = split_buffer(model, &audio, config)?;

    let workspace = tempdir()?;
    let mut staged: Vec<(String, PathBuf)> = Vec::with_capacity(mapping.len());
    for (name, buffer) in mapping.iter() {
        let path = workspace.path().join(format!("{name}.wav"));
        write_wav(&path, buffer)?;
        staged.push((name.to_string(), path));
    }

    fs::create_dir_all(out_dir)?;
    let mut files: Vec<StemFile> = Vec::with_capacity(staged.len());
    for (name, tmp_path) in staged {
        let dest = out_dir.join(format!("{name}.wav"));
        if let Err(e) = fs::copy(&tmp_path, &dest) {
            // All stems or none: roll back anything already persisted.
            for prior in &files {
                fs::remove_file(&prior.path).ok();
            }
            return Err(e.into());
        }
        files.push(StemFile { name, path: dest });
    }

    info!(
        input = %input.display(),
        out_dir = %out_dir.display(),
        stems = files.len(),
        "split written"
    );
    Ok(files)
}
