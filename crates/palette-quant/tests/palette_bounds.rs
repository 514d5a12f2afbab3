use std::time::Duration;

use fitgif_types::{EncodeOptions, Frame};
use palette_quant::{quantize, LiqQuantizer, NeuQuantizer, Quantizer};
use proptest::prelude::*;

fn frame_strategy() -> impl Strategy<Value = Frame> {
    (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
        prop::collection::vec(any::<u8>(), (w * h * 4) as usize).prop_map(move |pixels| {
            Frame::new(w, h, pixels, Duration::from_millis(40)).unwrap()
        })
    })
}

fn options_strategy() -> impl Strategy<Value = EncodeOptions> {
    (2u16..=256, any::<bool>(), 0.0f32..=1.0, 1u8..=10, 0u8..=100, any::<bool>()).prop_map(
        |(colors, dither, level, speed, quality, center)| {
            EncodeOptions::default()
                .with_max_colors(colors)
                .with_dithering(dither, level)
                .with_speed(speed)
                .with_quality(quality)
                .with_center_focus(center)
        },
    )
}

fn check(
    frame: &Frame,
    options: &EncodeOptions,
    backend: &dyn Quantizer,
) -> Result<(), TestCaseError> {
    let q = quantize(frame, options, backend);
    prop_assert!(!q.palette.is_empty());
    prop_assert!(q.palette.len() <= options.max_colors as usize);
    prop_assert_eq!(q.indices.len(), frame.pixel_count());
    prop_assert!(q.indices.iter().all(|&i| (i as usize) < q.palette.len()));
    prop_assert_eq!(q.duration, frame.duration());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn imagequant_output_within_bounds(frame in frame_strategy(), options in options_strategy()) {
        check(&frame, &options, &LiqQuantizer::new())?;
    }

    #[test]
    fn neuquant_output_within_bounds(frame in frame_strategy(), options in options_strategy()) {
        check(&frame, &options, &NeuQuantizer::new())?;
    }
}

#[test]
fn lossless_fast_path_is_pixel_identical() {
    // 16x16 frame with exactly 256 distinct colours, some translucent.
    let mut pixels = Vec::with_capacity(16 * 16 * 4);
    for i in 0..256u32 {
        let alpha = if i % 5 == 0 { 0 } else { 255 };
        pixels.extend_from_slice(&[i as u8, (255 - i) as u8, (i * 7) as u8, alpha]);
    }
    let frame = Frame::new(16, 16, pixels, Duration::from_millis(100)).unwrap();
    let options = EncodeOptions::default()
        .with_quality(100)
        .with_max_colors(256)
        .with_lossless_fast_path(true);

    for backend in [&LiqQuantizer::new() as &dyn Quantizer, &NeuQuantizer::new()] {
        let q = quantize(&frame, &options, backend);
        assert_eq!(q.palette.len(), 256);
        assert_eq!(q.to_rgba(), frame.pixels());
    }
}

#[test]
fn lossy_settings_reduce_palette() {
    let mut pixels = Vec::with_capacity(64 * 64 * 4);
    for y in 0..64u32 {
        for x in 0..64u32 {
            pixels.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 128, 255]);
        }
    }
    let frame = Frame::new(64, 64, pixels, Duration::from_millis(100)).unwrap();
    let options = EncodeOptions::default().with_max_colors(16).with_quality(80);

    let q = quantize(&frame, &options, &LiqQuantizer::new());
    assert!(q.palette.len() <= 16);
    assert_ne!(q.to_rgba(), frame.pixels());
}
