use color_quant::NeuQuant;
use fitgif_types::{EncodeOptions, Frame, CHANNELS};
use tracing::debug;

use crate::dither::floyd_steinberg;
use crate::{QuantError, Quantizer, Remapped};

/// Below this many pixels per palette entry the network does not train
/// meaningfully.
const MIN_PIXELS_PER_COLOR: usize = 4;

/// NeuQuant palette with in-house Floyd–Steinberg remapping.
///
/// `quantization_speed` 1..=10 maps onto the NeuQuant sample factor 1..=30
/// (1 = every pixel is a training sample). `quantization_quality` has no
/// NeuQuant equivalent and only matters for the lossless fast path.
#[derive(Debug, Clone, Default)]
pub struct NeuQuantizer;

impl NeuQuantizer {
    pub fn new() -> Self {
        Self
    }

    pub fn sample_factor(speed: u8) -> i32 {
        let speed = speed.clamp(1, 10) as i32;
        1 + (speed - 1) * 29 / 9
    }
}

impl Quantizer for NeuQuantizer {
    fn name(&self) -> &'static str {
        "neuquant"
    }

    fn remap(&self, frame: &Frame, options: &EncodeOptions) -> Result<Remapped, QuantError> {
        let colors = options.max_colors as usize;
        let pixel_count = frame.pixel_count();
        if pixel_count < colors * MIN_PIXELS_PER_COLOR {
            return Err(QuantError::TooSmall {
                backend: self.name(),
                pixels: pixel_count,
            });
        }

        let sample_fac = Self::sample_factor(options.quantization_speed);
        let nq = NeuQuant::new(sample_fac, colors, frame.pixels());

        let palette: Vec<[u8; 4]> = nq
            .color_map_rgba()
            .chunks_exact(CHANNELS)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();

        let indices = floyd_steinberg(
            frame.pixels(),
            frame.width(),
            frame.height(),
            &palette,
            options.effective_dither_level(),
            options.dither_center_focus,
            |px| nq.index_of(&px) as u8,
        );

        debug!(
            stage = "quantize",
            backend = "neuquant",
            sample_fac,
            colors = palette.len(),
            "Frame remapped"
        );

        Ok(Remapped { palette, indices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn noise_frame(width: u32, height: u32) -> Frame {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        let mut state = 0x2545_f491u32;
        for _ in 0..width * height {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
        Frame::new(width, height, pixels, Duration::from_millis(50)).unwrap()
    }

    #[test]
    fn test_sample_factor_range() {
        assert_eq!(NeuQuantizer::sample_factor(1), 1);
        assert_eq!(NeuQuantizer::sample_factor(10), 30);
        assert_eq!(NeuQuantizer::sample_factor(0), 1);
    }

    #[test]
    fn test_remap_bounds() {
        let frame = noise_frame(64, 48);
        let options = EncodeOptions::default().with_max_colors(32).with_speed(10);
        let remapped = NeuQuantizer::new().remap(&frame, &options).unwrap();
        assert!(remapped.palette.len() <= 32);
        assert_eq!(remapped.indices.len(), 64 * 48);
        assert!(remapped.indices.iter().all(|&i| (i as usize) < remapped.palette.len()));
    }

    #[test]
    fn test_deterministic() {
        let frame = noise_frame(40, 40);
        let options = EncodeOptions::default().with_max_colors(16);
        let a = NeuQuantizer::new().remap(&frame, &options).unwrap();
        let b = NeuQuantizer::new().remap(&frame, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tiny_frame_rejected() {
        let frame = noise_frame(4, 4);
        let options = EncodeOptions::default().with_max_colors(16);
        assert!(matches!(
            NeuQuantizer::new().remap(&frame, &options),
            Err(QuantError::TooSmall { .. })
        ));
    }
}
