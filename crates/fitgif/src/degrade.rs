use fitgif_types::{EncodeOptions, FitGifError, Frame, MAX_COLORS, MIN_COLORS};
use frame_ops::{kept_count, scaled_dimensions};
use serde::{Deserialize, Serialize};

/// Knobs the size-fit loop may turn, most preferred first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Knob {
    Similarity,
    Colors,
    Width,
}

impl Knob {
    pub const ORDER: [Knob; 3] = [Knob::Similarity, Knob::Colors, Knob::Width];

    pub fn as_str(self) -> &'static str {
        match self {
            Knob::Similarity => "similarity",
            Knob::Colors => "colors",
            Knob::Width => "width",
        }
    }
}

/// How the size-fit loop degrades settings between attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationPolicy {
    /// Retry ceiling, counting the first attempt.
    pub max_attempts: u32,
    /// First threshold used when the caller's is below it.
    pub similarity_seed: f32,
    pub similarity_growth: f32,
    pub similarity_ceiling: f32,
    pub color_floor: u16,
    pub width_factor: f32,
    pub width_floor: u32,
}

impl Default for DegradationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            similarity_seed: 4.0,
            similarity_growth: 2.0,
            similarity_ceiling: 32.0,
            color_floor: 16,
            width_factor: 0.75,
            width_floor: 64,
        }
    }
}

impl DegradationPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn validate(&self) -> Result<(), FitGifError> {
        let invalid = |message: String| Err(FitGifError::InvalidOptions { message });

        if self.max_attempts == 0 {
            return invalid("max_attempts must be at least 1".to_string());
        }
        if !(self.similarity_seed > 0.0) || !self.similarity_seed.is_finite() {
            return invalid(format!(
                "similarity_seed must be positive, got {}",
                self.similarity_seed
            ));
        }
        if !(self.similarity_growth > 1.0) || !self.similarity_growth.is_finite() {
            return invalid(format!(
                "similarity_growth must be greater than 1, got {}",
                self.similarity_growth
            ));
        }
        if !(self.similarity_ceiling >= self.similarity_seed)
            || !self.similarity_ceiling.is_finite()
        {
            return invalid(format!(
                "similarity_ceiling {} is below similarity_seed {}",
                self.similarity_ceiling, self.similarity_seed
            ));
        }
        if !(MIN_COLORS..=MAX_COLORS).contains(&self.color_floor) {
            return invalid(format!(
                "color_floor must be in {}..={}, got {}",
                MIN_COLORS, MAX_COLORS, self.color_floor
            ));
        }
        if !(self.width_factor > 0.0 && self.width_factor < 1.0) {
            return invalid(format!("width_factor must be in (0, 1), got {}", self.width_factor));
        }
        if self.width_floor == 0 {
            return invalid("width_floor must be at least 1".to_string());
        }
        Ok(())
    }

    /// Settings with `knob` turned one step, or `None` when turning it would
    /// not shrink anything.
    ///
    /// The similarity knob keeps growing the threshold until `source` loses
    /// at least one more frame, and gives up at the ceiling.
    pub fn turn(
        &self,
        knob: Knob,
        options: &EncodeOptions,
        source: &[Frame],
    ) -> Option<EncodeOptions> {
        match knob {
            Knob::Similarity => {
                let kept = kept_count(source, options.similarity_threshold);
                let mut current = options.similarity_threshold;
                loop {
                    let next = self.next_threshold(current);
                    if !(next > current) {
                        return None;
                    }
                    if kept_count(source, next) < kept {
                        return Some(options.clone().with_similarity_threshold(next));
                    }
                    current = next;
                }
            }
            Knob::Colors => {
                let current = options.max_colors;
                let next = (current / 2).max(self.color_floor);
                (next < current).then(|| options.clone().with_max_colors(next))
            }
            Knob::Width => {
                let source_width = source.first().map_or(0, Frame::width);
                let current = effective_width(options.max_width_pixels, source_width);
                let next = (current as f32 * self.width_factor).floor() as u32;
                let next = next.max(self.width_floor);
                (next < current).then(|| options.clone().with_max_width(next))
            }
        }
    }

    fn next_threshold(&self, current: f32) -> f32 {
        if current < self.similarity_seed {
            self.similarity_seed
        } else {
            (current * self.similarity_growth).min(self.similarity_ceiling)
        }
    }

    /// Next degradation step, round-robin over [`Knob::ORDER`] starting at
    /// `cursor` and skipping knobs that can no longer shrink the output.
    /// `None` once every knob is exhausted.
    pub fn next(
        &self,
        options: &EncodeOptions,
        source: &[Frame],
        cursor: &mut usize,
    ) -> Option<(Knob, EncodeOptions)> {
        for offset in 0..Knob::ORDER.len() {
            let idx = (*cursor + offset) % Knob::ORDER.len();
            let knob = Knob::ORDER[idx];
            if let Some(next) = self.turn(knob, options, source) {
                *cursor = idx + 1;
                return Some((knob, next));
            }
        }
        None
    }
}

fn effective_width(max_width: u32, source_width: u32) -> u32 {
    if max_width == 0 || max_width > source_width {
        source_width
    } else {
        max_width
    }
}

/// Upper bound on the artifact size `options` allow for `source`: the frames
/// the reducer keeps, one uncompressed index byte per scaled pixel, and one
/// local colour table per frame sized for `max_colors`.
pub fn theoretical_bound(options: &EncodeOptions, source: &[Frame]) -> u64 {
    let Some(first) = source.first() else {
        return 0;
    };
    let (width, height) =
        scaled_dimensions(first.width(), first.height(), options.max_width_pixels)
            .unwrap_or(first.dimensions());
    let colors = options.max_colors.clamp(MIN_COLORS, MAX_COLORS) as u32;
    let bits = (32 - (colors - 1).leading_zeros()).max(1);

    let frame_count = kept_count(source, options.similarity_threshold) as u64;
    let pixel_bytes = width as u64 * height as u64;
    let palette_bytes = 3 * (1u64 << bits);
    frame_count * (pixel_bytes + palette_bytes)
}
