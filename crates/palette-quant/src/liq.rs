use fitgif_types::{EncodeOptions, Frame, CHANNELS};
use imagequant::{Attributes, Image, RGBA};
use tracing::debug;

use crate::dither::center_importance_map;
use crate::{QuantError, Quantizer, Remapped};

/// libimagequant backend: honours speed, quality and dithering level.
/// Centre focus is expressed as an importance map.
#[derive(Debug, Clone, Default)]
pub struct LiqQuantizer;

impl LiqQuantizer {
    pub fn new() -> Self {
        Self
    }
}

impl Quantizer for LiqQuantizer {
    fn name(&self) -> &'static str {
        "imagequant"
    }

    fn remap(&self, frame: &Frame, options: &EncodeOptions) -> Result<Remapped, QuantError> {
        let mut attr = Attributes::new();
        attr.set_max_colors(options.max_colors as u32)?;
        attr.set_speed(options.quantization_speed as i32)?;
        attr.set_quality(0, options.quantization_quality)?;

        let pixels: Vec<RGBA> = frame
            .pixels()
            .chunks_exact(CHANNELS)
            .map(|p| RGBA::new(p[0], p[1], p[2], p[3]))
            .collect();

        let mut image = Image::new_borrowed(
            &attr,
            &pixels,
            frame.width() as usize,
            frame.height() as usize,
            0.0, // gamma (0 = sRGB)
        )?;

        if options.dither_center_focus {
            image.set_importance_map(center_importance_map(frame.width(), frame.height()))?;
        }

        let mut result = attr.quantize(&mut image)?;
        result.set_dithering_level(options.effective_dither_level())?;

        let (palette, indices) = result.remapped(&mut image)?;

        debug!(
            stage = "quantize",
            backend = "imagequant",
            colors = palette.len(),
            quality = options.quantization_quality,
            speed = options.quantization_speed,
            "Frame remapped"
        );

        Ok(Remapped {
            palette: palette.iter().map(|c| [c.r, c.g, c.b, c.a]).collect(),
            indices,
        })
    }
}
