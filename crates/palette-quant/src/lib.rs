//! Palette quantization: true-colour frames to indexed frames bounded by
//! `EncodeOptions::max_colors`.
//!
//! [`quantize`] owns the contract (lossless fast path, exact palettes,
//! bounds checking, degenerate-input fallback); a [`Quantizer`] backend only
//! has to produce a palette and an index map.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use fitgif_types::{EncodeOptions, Frame, QuantizedFrame, MAX_COLORS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod dither;
pub mod exact;
pub mod liq;
pub mod neuquant;

pub use exact::{exact_palette, popularity_quantize};
pub use liq::LiqQuantizer;
pub use neuquant::NeuQuantizer;

/// Palette plus per-pixel indices, as produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapped {
    pub palette: Vec<[u8; 4]>,
    pub indices: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum QuantError {
    #[error("imagequant failed: {0}")]
    Liq(#[from] imagequant::Error),

    #[error("frame too small for {backend}: {pixels} pixels")]
    TooSmall { backend: &'static str, pixels: usize },

    #[error("backend produced invalid output: {0}")]
    InvalidOutput(String),
}

/// A palette-quantization backend.
pub trait Quantizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Builds a palette of at most `options.max_colors` entries for `frame`
    /// and maps every pixel to it.
    fn remap(&self, frame: &Frame, options: &EncodeOptions) -> Result<Remapped, QuantError>;
}

/// Selectable built-in backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizerKind {
    #[default]
    Liq,
    NeuQuant,
}

impl QuantizerKind {
    pub fn build(self) -> Arc<dyn Quantizer> {
        match self {
            QuantizerKind::Liq => Arc::new(LiqQuantizer::new()),
            QuantizerKind::NeuQuant => Arc::new(NeuQuantizer::new()),
        }
    }
}

impl std::str::FromStr for QuantizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "liq" | "imagequant" => Ok(QuantizerKind::Liq),
            "neuquant" | "nq" => Ok(QuantizerKind::NeuQuant),
            other => Err(format!("unknown quantizer '{}'", other)),
        }
    }
}

/// Quantizes one frame. Never fails: backend errors, panics and out-of-bounds
/// output fall back to a popularity palette.
pub fn quantize(
    frame: &Frame,
    options: &EncodeOptions,
    backend: &dyn Quantizer,
) -> QuantizedFrame {
    let max_colors = options.max_colors.clamp(2, MAX_COLORS) as usize;

    // Lossless fast path: a 1:1 palette when the frame fits in one.
    if options.lossless_requested() {
        if let Some(remapped) = exact_palette(frame, MAX_COLORS as usize) {
            debug!(stage = "quantize", colors = remapped.palette.len(), "Lossless fast path");
            return assemble(frame, remapped);
        }
        debug!(
            stage = "quantize",
            "Lossless fast path unavailable: more than 256 colours"
        );
    }

    // Nothing to lose: the frame already fits the palette bound.
    if let Some(remapped) = exact_palette(frame, max_colors) {
        debug!(stage = "quantize", colors = remapped.palette.len(), "Exact palette");
        return assemble(frame, remapped);
    }

    let attempt = catch_unwind(AssertUnwindSafe(|| backend.remap(frame, options)));
    let remapped = match attempt {
        Ok(Ok(remapped)) => match validate(&remapped, max_colors, frame.pixel_count()) {
            Ok(()) => remapped,
            Err(reason) => {
                warn!(
                    stage = "quantize",
                    backend = backend.name(),
                    %reason,
                    "Falling back to popularity palette"
                );
                popularity_quantize(frame, max_colors)
            }
        },
        Ok(Err(err)) => {
            warn!(
                stage = "quantize",
                backend = backend.name(),
                error = %err,
                "Falling back to popularity palette"
            );
            popularity_quantize(frame, max_colors)
        }
        Err(_) => {
            warn!(
                stage = "quantize",
                backend = backend.name(),
                "Backend panicked, falling back to popularity palette"
            );
            popularity_quantize(frame, max_colors)
        }
    };

    assemble(frame, remapped)
}

fn validate(remapped: &Remapped, max_colors: usize, pixels: usize) -> Result<(), String> {
    let len = remapped.palette.len();
    if len == 0 || len > max_colors {
        return Err(format!("palette of {} entries, bound is {}", len, max_colors));
    }
    if remapped.indices.len() != pixels {
        return Err(format!("{} indices for {} pixels", remapped.indices.len(), pixels));
    }
    if remapped.indices.iter().any(|&i| i as usize >= len) {
        return Err("index outside palette".to_string());
    }
    Ok(())
}

fn assemble(frame: &Frame, remapped: Remapped) -> QuantizedFrame {
    QuantizedFrame {
        width: frame.width(),
        height: frame.height(),
        indices: remapped.indices,
        palette: remapped.palette,
        duration: frame.duration(),
    }
}
