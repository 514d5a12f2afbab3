use serde::{Deserialize, Serialize};

use crate::FitGifError;

pub const MIN_COLORS: u16 = 2;
pub const MAX_COLORS: u16 = 256;

/// Caller-supplied encoding settings for one pipeline invocation.
///
/// Values are plain data; the size-fit controller derives new records from
/// this one instead of mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Palette size bound, 2..=256.
    pub max_colors: u16,
    pub dither_enabled: bool,
    /// Error-diffusion strength, 0.0..=1.0.
    pub dither_level: f32,
    /// Bias dithering (and palette selection) toward the image centre.
    pub dither_center_focus: bool,
    /// 1 = best quality/slowest, 10 = fastest.
    pub quantization_speed: u8,
    /// 0..=100.
    pub quantization_quality: u8,
    /// 0 loops forever.
    pub loop_count: u16,
    /// 0 keeps the source width.
    pub max_width_pixels: u32,
    /// 0 means no size budget.
    pub max_file_size_kb: u64,
    /// Mean absolute channel difference (0..=255 scale) below which a frame
    /// counts as a duplicate of the last kept frame. 0 disables reduction.
    pub similarity_threshold: f32,
    pub skip_quantization_when_lossless: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_colors: MAX_COLORS,
            dither_enabled: true,
            dither_level: 1.0,
            dither_center_focus: false,
            quantization_speed: 4,
            quantization_quality: 90,
            loop_count: 0,
            max_width_pixels: 0,
            max_file_size_kb: 0,
            similarity_threshold: 1.0,
            skip_quantization_when_lossless: true,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_colors(mut self, max_colors: u16) -> Self {
        self.max_colors = max_colors;
        self
    }

    pub fn with_dithering(mut self, enabled: bool, level: f32) -> Self {
        self.dither_enabled = enabled;
        self.dither_level = level;
        self
    }

    pub fn with_center_focus(mut self, enabled: bool) -> Self {
        self.dither_center_focus = enabled;
        self
    }

    pub fn with_speed(mut self, speed: u8) -> Self {
        self.quantization_speed = speed;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quantization_quality = quality;
        self
    }

    pub fn with_loop_count(mut self, loop_count: u16) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn with_max_width(mut self, max_width_pixels: u32) -> Self {
        self.max_width_pixels = max_width_pixels;
        self
    }

    pub fn with_max_file_size_kb(mut self, max_file_size_kb: u64) -> Self {
        self.max_file_size_kb = max_file_size_kb;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_lossless_fast_path(mut self, enabled: bool) -> Self {
        self.skip_quantization_when_lossless = enabled;
        self
    }

    /// Byte budget, `None` when unconstrained.
    pub fn size_budget_bytes(&self) -> Option<u64> {
        match self.max_file_size_kb {
            0 => None,
            kb => Some(kb.saturating_mul(1024)),
        }
    }

    /// Whether an artifact of `size_bytes` satisfies the budget.
    pub fn fits_budget(&self, size_bytes: u64) -> bool {
        self.size_budget_bytes().map_or(true, |budget| size_bytes <= budget)
    }

    /// Dithering strength actually applied, 0 when dithering is off.
    pub fn effective_dither_level(&self) -> f32 {
        if self.dither_enabled {
            self.dither_level
        } else {
            0.0
        }
    }

    /// Whether the lossless fast path is requested.
    pub fn lossless_requested(&self) -> bool {
        self.skip_quantization_when_lossless
            && self.quantization_quality >= 100
            && self.max_colors >= MAX_COLORS
    }

    pub fn validate(&self) -> Result<(), FitGifError> {
        if !(MIN_COLORS..=MAX_COLORS).contains(&self.max_colors) {
            return Err(invalid(format!(
                "max_colors must be in {}..={}, got {}",
                MIN_COLORS, MAX_COLORS, self.max_colors
            )));
        }
        if !(0.0..=1.0).contains(&self.dither_level) {
            return Err(invalid(format!(
                "dither_level must be in 0..=1, got {}",
                self.dither_level
            )));
        }
        if !(1..=10).contains(&self.quantization_speed) {
            return Err(invalid(format!(
                "quantization_speed must be in 1..=10, got {}",
                self.quantization_speed
            )));
        }
        if self.quantization_quality > 100 {
            return Err(invalid(format!(
                "quantization_quality must be in 0..=100, got {}",
                self.quantization_quality
            )));
        }
        if !self.similarity_threshold.is_finite() || self.similarity_threshold < 0.0 {
            return Err(invalid(format!(
                "similarity_threshold must be a non-negative number, got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> FitGifError {
    FitGifError::InvalidOptions { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EncodeOptions::default().validate().is_ok());
    }

    #[test]
    fn test_range_checks() {
        let base = EncodeOptions::default();
        assert!(base.clone().with_max_colors(1).validate().is_err());
        assert!(base.clone().with_max_colors(257).validate().is_err());
        assert!(base.clone().with_dithering(true, 1.5).validate().is_err());
        assert!(base.clone().with_speed(0).validate().is_err());
        assert!(base.clone().with_speed(11).validate().is_err());
        assert!(base.clone().with_quality(101).validate().is_err());
        assert!(base.clone().with_similarity_threshold(-1.0).validate().is_err());
        assert!(base.with_similarity_threshold(f32::NAN).validate().is_err());
    }

    #[test]
    fn test_budget() {
        let unconstrained = EncodeOptions::default();
        assert_eq!(unconstrained.size_budget_bytes(), None);
        assert!(unconstrained.fits_budget(u64::MAX));

        let tight = EncodeOptions::default().with_max_file_size_kb(2);
        assert_eq!(tight.size_budget_bytes(), Some(2048));
        assert!(tight.fits_budget(2048));
        assert!(!tight.fits_budget(2049));
    }

    #[test]
    fn test_lossless_requested() {
        let opts = EncodeOptions::default().with_quality(100).with_max_colors(256);
        assert!(opts.lossless_requested());
        assert!(!opts.clone().with_max_colors(128).lossless_requested());
        assert!(!opts.with_lossless_fast_path(false).lossless_requested());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: EncodeOptions =
            serde_json::from_str(r#"{ "max_colors": 64, "max_file_size_kb": 500 }"#).unwrap();
        assert_eq!(opts.max_colors, 64);
        assert_eq!(opts.max_file_size_kb, 500);
        assert_eq!(opts.quantization_speed, EncodeOptions::default().quantization_speed);
    }
}
