//! Audio file I/O: symphonia decode of uploads, hound WAV encode of stems.

use std::fs::File;
use std::path::Path;

use hound::WavWriter;
use ndarray::Array2;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::error::{Result, StemError};
use crate::types::AudioBuffer;

/// Upload formats the front-end accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|e| ext.eq_ignore_ascii_case(e))
}

/// Decode an audio file (mp3 or wav) into a planar buffer.
pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| StemError::decode(&shown, e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| StemError::decode(&shown, "no default audio track"))?;
    let track_id = track.id;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| StemError::decode(&shown, e.to_string()))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // Symphonia signals end-of-stream as an unexpected-eof IO error.
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(StemError::decode(&shown, e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| StemError::decode(&shown, e.to_string()))?;
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count();

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buffer.samples());
    }

    if channels == 0 || interleaved.is_empty() {
        return Err(StemError::decode(&shown, "stream contains no audio"));
    }

    let frames = interleaved.len() / channels;
    let mut data = Array2::<f32>::zeros((channels, frames));
    for frame in 0..frames {
        for ch in 0..channels {
            data[[ch, frame]] = interleaved[frame * channels + ch];
        }
    }

    debug!(
        path = %shown,
        sample_rate,
        channels,
        frames,
        "decoded audio"
    );

    Ok(AudioBuffer::new(data, sample_rate))
}

/// Write a planar buffer as 16-bit PCM WAV.
pub fn write_wav<P: AsRef<Path>>(path: P, audio: &AudioBuffer) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: audio.channels() as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        WavWriter::create(path, spec).map_err(|e| wav_io_error(path, e))?;
    for frame in 0..audio.frames() {
        for ch in 0..audio.channels() {
            let s = (audio.data[[ch, frame]] * i16::MAX as f32)
                .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            writer.write_sample(s).map_err(|e| wav_io_error(path, e))?;
        }
    }
    writer.finalize().map_err(|e| wav_io_error(path, e))?;
    Ok(())
}

fn wav_io_error(path: &Path, e: hound::Error) -> StemError {
    match e {
        hound::Error::IoError(io) => StemError::Io(io),
        other => StemError::Io(std::io::Error::other(format!(
            "writing `{}`: {other}",
            path.display()
        ))),
    }
}
