use std::time::Duration;

use fitgif::{
    CancelToken, DegradationPolicy, EncodeOptions, FitEncoder, FitGifError, Frame, FrameSequence,
    NoProgress, Progress, Stage,
};

fn noise_sequence(count: usize, width: u32, height: u32) -> FrameSequence {
    let mut state = 0x9e37_79b9_u32;
    let frames = (0..count)
        .map(|_| {
            let pixels: Vec<u8> = (0..width * height)
                .flat_map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    let [r, g, b, _] = state.to_le_bytes();
                    [r, g, b, 255]
                })
                .collect();
            Frame::new(width, height, pixels, Duration::from_millis(50)).unwrap()
        })
        .collect();
    FrameSequence::new(frames).unwrap()
}

#[test]
fn cancel_during_second_attempt_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.gif");

    let encoder = FitEncoder::builder()
        .threads(2)
        .policy(DegradationPolicy::default().with_max_attempts(5))
        .build()
        .unwrap();
    let options = EncodeOptions::default().with_max_file_size_kb(1);
    let cancel = CancelToken::new();
    let sink = |p: Progress| {
        if p.attempt == 2 && p.stage == Stage::Quantize {
            cancel.cancel();
        }
    };

    let err = encoder
        .encode_to_path(&noise_sequence(12, 40, 40), &options, &dest, &sink, &cancel)
        .unwrap_err();

    assert_eq!(err, FitGifError::Cancelled);
    assert!(err.is_cancelled());
    assert!(!dest.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn cancel_during_encode_stage() {
    let encoder = FitEncoder::builder().threads(1).build().unwrap();
    let cancel = CancelToken::new();
    let sink = |p: Progress| {
        if p.stage == Stage::Encode {
            cancel.cancel();
        }
    };

    let err = encoder
        .encode(&noise_sequence(4, 16, 16), &EncodeOptions::default(), &sink, &cancel)
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn completed_encode_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested-name.gif");

    let encoder = FitEncoder::builder().threads(2).build().unwrap();
    let outcome = encoder
        .encode_to_path(
            &noise_sequence(3, 24, 24),
            &EncodeOptions::default(),
            &dest,
            &NoProgress,
            &CancelToken::new(),
        )
        .unwrap();

    let written = std::fs::read(&dest).unwrap();
    assert_eq!(written, outcome.best.bytes);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn missing_destination_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing").join("out.gif");

    let encoder = FitEncoder::builder().threads(1).build().unwrap();
    let err = encoder
        .encode_to_path(
            &noise_sequence(1, 8, 8),
            &EncodeOptions::default(),
            &dest,
            &NoProgress,
            &CancelToken::new(),
        )
        .unwrap_err();
    assert_eq!(err.code(), "E_IO");
}
