use approx::assert_abs_diff_eq;
use ndarray::Array2;

use stem_studio::core::dsp::{conform_stereo, fade_weights, resample};
use stem_studio::{AudioBuffer, StemError};

const SR: u32 = 44_100;

#[test]
fn conform_duplicates_mono_onto_both_channels() {
    let mono = AudioBuffer::new(
        Array2::from_shape_vec((1, 4), vec![0.1, -0.2, 0.3, -0.4]).unwrap(),
        SR,
    );
    let stereo = conform_stereo(&mono).unwrap();

    assert_eq!(stereo.channels(), 2);
    assert_eq!(stereo.frames(), 4);
    for i in 0..4 {
        assert_abs_diff_eq!(stereo.data[[0, i]], mono.data[[0, i]], epsilon = 1e-7);
        assert_abs_diff_eq!(stereo.data[[1, i]], mono.data[[0, i]], epsilon = 1e-7);
    }
}

#[test]
fn conform_passes_stereo_through() {
    let input = AudioBuffer::new(
        Array2::from_shape_fn((2, 16), |(ch, i)| ch as f32 + i as f32 * 0.01),
        SR,
    );
    let out = conform_stereo(&input).unwrap();
    assert_eq!(out, input);
}

#[test]
fn conform_rejects_surround() {
    let input = AudioBuffer::new(Array2::zeros((6, 16)), SR);
    assert!(matches!(
        conform_stereo(&input),
        Err(StemError::Inference { .. })
    ));
}

#[test]
fn resample_is_a_noop_for_matching_rates() {
    let input = AudioBuffer::new(Array2::from_shape_fn((2, 64), |(_, i)| i as f32), SR);
    let out = resample(&input, SR).unwrap();
    assert_eq!(out, input);
}

#[test]
fn resample_halves_the_frame_count() {
    let frames = 4_096usize;
    let input = AudioBuffer::new(
        Array2::from_shape_fn((2, frames), |(_, i)| (i as f32 * 0.02).sin()),
        SR,
    );
    let out = resample(&input, SR / 2).unwrap();

    assert_eq!(out.sample_rate, SR / 2);
    assert_eq!(out.channels(), 2);
    let expected = frames as i64 / 2;
    assert!(
        (out.frames() as i64 - expected).abs() <= 64,
        "got {} frames, expected about {expected}",
        out.frames()
    );
}

#[test]
fn interior_frames_keep_full_weight() {
    let weights = fade_weights(100, 10, false, false);
    for w in &weights[10..90] {
        assert_abs_diff_eq!(*w, 1.0, epsilon = 1e-7);
    }
}

#[test]
fn first_and_last_chunks_skip_their_outer_ramps() {
    let first = fade_weights(100, 10, true, false);
    assert_abs_diff_eq!(first[0], 1.0, epsilon = 1e-7);
    assert!(first[99] < 1.0);

    let last = fade_weights(100, 10, false, true);
    assert!(last[0] < 1.0);
    assert_abs_diff_eq!(last[99], 1.0, epsilon = 1e-7);
}

#[test]
fn adjoining_ramps_are_complementary() {
    // The fade-out tail of one chunk and the fade-in head of the next
    // must sum to one at every overlapping frame, so blending never
    // changes the level of a constant signal.
    let overlap = 8;
    let tail = fade_weights(64, overlap, true, false);
    let head = fade_weights(64, overlap, false, true);

    for k in 0..overlap {
        let sum = tail[64 - overlap + k] + head[k];
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-6);
    }
}
