use approx::assert_abs_diff_eq;
use ndarray::Array2;
use std::f32::consts::PI;
use std::fs;
use std::io::Cursor;
use tempfile::tempdir;

use stem_studio::{
    split_buffer, split_file, split_upload, AudioBuffer, SeparationResult, Separator, StemConfig,
    StemError, ACCOMPANIMENT, VOCALS,
};

/// Deterministic stand-in for the ONNX engine: source `i` is the input
/// scaled by `1 / (i + 1)`.
struct StubSeparator {
    names: Vec<String>,
    rate: u32,
}

impl StubSeparator {
    fn four_stem(rate: u32) -> Self {
        Self {
            names: ["vocals", "drums", "bass", "other"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rate,
        }
    }

    fn without_vocals(rate: u32) -> Self {
        Self {
            names: vec!["drums".to_string(), "bass".to_string()],
            rate,
        }
    }
}

impl Separator for StubSeparator {
    fn name(&self) -> &str {
        "stub"
    }

    fn source_names(&self) -> &[String] {
        &self.names
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn separate(&self, input: &AudioBuffer) -> stem_studio::Result<SeparationResult> {
        let mut result = SeparationResult::new();
        for (i, name) in self.names.iter().enumerate() {
            let scaled = &input.data * (1.0 / (i as f32 + 1.0));
            result.push(name, AudioBuffer::new(scaled, input.sample_rate));
        }
        Ok(result)
    }
}

fn wav_fixture(frames: usize, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        writer
            .write_sample(((2.0 * PI * 440.0 * t).sin() * 0.2 * 32767.0) as i16)
            .unwrap();
        writer
            .write_sample(((2.0 * PI * 660.0 * t).sin() * 0.2 * 32767.0) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

#[test]
fn split_upload_produces_two_downloadable_stems() {
    let model = StubSeparator::four_stem(44_100);
    let payload = wav_fixture(8_000, 44_100);

    let artifacts = split_upload(&model, &payload, "wav", StemConfig::TwoStem).unwrap();

    let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, [VOCALS, ACCOMPANIMENT]);

    for artifact in &artifacts {
        assert_eq!(artifact.file_name, format!("{}.wav", artifact.name));
        let reader = hound::WavReader::new(Cursor::new(&artifact.data)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 44_100);
        assert_eq!(reader.duration(), 8_000);
    }
}

#[test]
fn split_upload_rejects_unknown_extensions() {
    let model = StubSeparator::four_stem(44_100);
    let payload = wav_fixture(1_000, 44_100);

    assert!(matches!(
        split_upload(&model, &payload, "flac", StemConfig::TwoStem),
        Err(StemError::Decode { .. })
    ));
}

#[test]
fn split_file_writes_one_wav_per_stem() {
    let model = StubSeparator::four_stem(44_100);
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("track.wav");
    fs::write(&input, wav_fixture(8_000, 44_100)).unwrap();
    let out_dir = tmp.path().join("stems");

    let files = split_file(&model, &input, &out_dir, StemConfig::FourStem).unwrap();

    assert_eq!(files.len(), 4);
    for stem in &files {
        assert!(stem.path.exists(), "missing {}", stem.path.display());
        let reader = hound::WavReader::open(&stem.path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert!(reader.duration() > 0);
    }
}

#[test]
fn split_buffer_resamples_to_the_model_rate() {
    let model = StubSeparator::four_stem(44_100);
    let frames = 4_096usize;
    let input = AudioBuffer::new(
        Array2::from_shape_fn((2, frames), |(_, i)| (i as f32 * 0.01).sin() * 0.3),
        22_050,
    );

    let mapping = split_buffer(&model, &input, StemConfig::FourStem).unwrap();

    for (name, buffer) in mapping.iter() {
        assert_eq!(buffer.sample_rate, 44_100, "stem `{name}` rate");
        let expected = frames as i64 * 2;
        assert!(
            (buffer.frames() as i64 - expected).abs() <= 128,
            "stem `{name}`: {} frames, expected about {expected}",
            buffer.frames()
        );
    }
}

#[test]
fn split_buffer_upmixes_mono_input() {
    let model = StubSeparator::four_stem(44_100);
    let input = AudioBuffer::new(
        Array2::from_shape_fn((1, 2_048), |(_, i)| (i as f32 * 0.05).sin()),
        44_100,
    );

    let mapping = split_buffer(&model, &input, StemConfig::TwoStem).unwrap();
    let vocals = mapping.get(VOCALS).unwrap();
    assert_eq!(vocals.channels(), 2);
    for i in (0..2_048).step_by(97) {
        assert_abs_diff_eq!(vocals.data[[0, i]], vocals.data[[1, i]], epsilon = 1e-6);
    }
}

#[test]
fn two_stem_against_a_model_without_vocals_fails_cleanly() {
    let model = StubSeparator::without_vocals(44_100);
    let input = AudioBuffer::new(Array2::zeros((2, 1_024)), 44_100);

    assert!(matches!(
        split_buffer(&model, &input, StemConfig::TwoStem),
        Err(StemError::Configuration { .. })
    ));
}
