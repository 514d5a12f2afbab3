use std::time::Duration;

use fitgif_types::QuantizedFrame;
use gif_container::{inspect_gif, ContainerEncoder, GifContainer};
use sha2::{Digest, Sha256};

fn gradient_frames(count: usize, width: u32, height: u32, ms: u64) -> Vec<QuantizedFrame> {
    let palette: Vec<[u8; 4]> = (0..16u8).map(|i| [i * 16, 255 - i * 16, 128, 255]).collect();
    (0..count)
        .map(|n| QuantizedFrame {
            width,
            height,
            indices: (0..width * height)
                .map(|i| ((i as usize + n) % palette.len()) as u8)
                .collect(),
            palette: palette.clone(),
            duration: Duration::from_millis(ms),
        })
        .collect()
}

fn encode(frames: &[QuantizedFrame], loop_count: u16) -> Vec<u8> {
    GifContainer::new()
        .encode(frames, loop_count, &mut |_, _| true)
        .expect("encode")
}

#[test]
fn identical_input_produces_identical_bytes() {
    let frames = gradient_frames(8, 32, 24, 80);
    let first = Sha256::digest(encode(&frames, 0));
    let second = Sha256::digest(encode(&frames, 0));
    assert_eq!(first, second);
}

#[test]
fn loop_count_changes_output() {
    let frames = gradient_frames(2, 8, 8, 100);
    assert_ne!(encode(&frames, 0), encode(&frames, 3));
}

#[test]
fn delays_sum_to_total_duration() {
    // 12 frames at 1/30 s each: 400 ms total.
    let frames: Vec<_> = gradient_frames(12, 16, 16, 0)
        .into_iter()
        .map(|mut f| {
            f.duration = Duration::from_nanos(33_333_333);
            f
        })
        .collect();
    let info = inspect_gif(&encode(&frames, 0)).unwrap();
    assert_eq!(info.frame_count, 12);
    assert_eq!(info.total_delay_cs, 40);
}

#[test]
fn artifact_can_be_written_and_reread() {
    let frames = gradient_frames(4, 20, 10, 50);
    let bytes = encode(&frames, 0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.gif");
    std::fs::write(&path, &bytes).unwrap();

    let reread = std::fs::read(&path).unwrap();
    let info = inspect_gif(&reread).unwrap();
    assert_eq!((info.width, info.height), (20, 10));
    assert_eq!(info.frame_count, 4);
    assert!(info.max_palette_len <= 16);
}
