use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod frame;
mod options;

pub use frame::{total_duration, Frame, FrameSequence, CHANNELS};
pub use options::{EncodeOptions, MAX_COLORS, MIN_COLORS};

/// Indexed-colour raster produced by the quantizer for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedFrame {
    pub width: u32,
    pub height: u32,
    /// One palette index per pixel, row-major.
    pub indices: Vec<u8>,
    /// Straight-alpha RGBA entries, at most 256.
    pub palette: Vec<[u8; 4]>,
    pub duration: Duration,
}

impl QuantizedFrame {
    /// Palette is non-empty and within 256 entries, every index addresses it,
    /// and the index buffer covers the raster.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.palette.is_empty() || self.palette.len() > MAX_COLORS as usize {
            return Err(format!("palette has {} entries", self.palette.len()));
        }
        let expected = self.width as usize * self.height as usize;
        if self.indices.len() != expected {
            return Err(format!(
                "index buffer has {} entries, raster is {}x{}",
                self.indices.len(),
                self.width,
                self.height
            ));
        }
        let limit = self.palette.len();
        if let Some(pos) = self.indices.iter().position(|&i| i as usize >= limit) {
            return Err(format!(
                "index {} at pixel {} exceeds palette of {}",
                self.indices[pos], pos, limit
            ));
        }
        Ok(())
    }

    /// Palette as packed RGB bytes.
    pub fn palette_rgb(&self) -> Vec<u8> {
        self.palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect()
    }

    /// Expands back to straight RGBA8.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.indices
            .iter()
            .flat_map(|&i| self.palette[i as usize])
            .collect()
    }
}

/// Terminal state of the size-fit loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// Budget met (or no budget).
    Satisfied,
    /// Retry ceiling or degradation floors reached without meeting the budget.
    Exhausted,
}

/// One encoded artifact and the settings that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeAttemptResult {
    pub bytes: Vec<u8>,
    pub achieved_size_bytes: u64,
    pub settings_used: EncodeOptions,
    pub within_budget: bool,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
}

/// Diagnostics for a single attempt of the size-fit loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt: u32,
    /// Knob turned to produce this attempt's settings; `None` for the first.
    pub degraded: Option<String>,
    pub size_bytes: u64,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub max_colors: u16,
    pub similarity_threshold: f32,
    pub processing_time_ms: u64,
}

/// What the pipeline hands back for a completed (non-cancelled) encode.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    /// The satisfying artifact, or the smallest one when exhausted.
    pub best: EncodeAttemptResult,
    pub status: FitStatus,
    pub attempts: u32,
    pub history: Vec<AttemptSummary>,
}

impl FitOutcome {
    pub fn within_budget(&self) -> bool {
        self.best.within_budget
    }
}

/// Structured error taxonomy with stable codes
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitGifError {
    #[error("E_INPUT_EMPTY: no frames to encode")]
    EmptyInput,

    #[error("E_INPUT_FRAME: invalid frame: {message}")]
    InvalidFrame { message: String },

    #[error("E_CONFIG_OPTIONS: invalid encode options: {message}")]
    InvalidOptions { message: String },

    #[error("E_ENCODE_FAILED: container encoder failed: {message}")]
    EncodeFailed { message: String },

    #[error("E_CANCELLED: encode cancelled")]
    Cancelled,

    #[error("E_IO: I/O operation failed: {message}")]
    Io { message: String },

    #[error("E_WORKER_POOL: worker pool unavailable: {message}")]
    WorkerPool { message: String },
}

impl FitGifError {
    /// Get structured error code for logging and monitoring
    pub fn code(&self) -> &'static str {
        match self {
            FitGifError::EmptyInput => "E_INPUT_EMPTY",
            FitGifError::InvalidFrame { .. } => "E_INPUT_FRAME",
            FitGifError::InvalidOptions { .. } => "E_CONFIG_OPTIONS",
            FitGifError::EncodeFailed { .. } => "E_ENCODE_FAILED",
            FitGifError::Cancelled => "E_CANCELLED",
            FitGifError::Io { .. } => "E_IO",
            FitGifError::WorkerPool { .. } => "E_WORKER_POOL",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FitGifError::Cancelled)
    }
}

impl From<std::io::Error> for FitGifError {
    fn from(err: std::io::Error) -> Self {
        FitGifError::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> QuantizedFrame {
        QuantizedFrame {
            width: 2,
            height: 2,
            indices: vec![0, 1, 1, 0],
            palette: vec![[255, 0, 0, 255], [0, 0, 255, 255]],
            duration: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_quantized_invariants() {
        let frame = sample_frame();
        assert!(frame.check_invariants().is_ok());
        assert_eq!(frame.palette_rgb(), vec![255, 0, 0, 0, 0, 255]);
        assert_eq!(&frame.to_rgba()[4..8], &[0, 0, 255, 255]);

        let mut bad_index = sample_frame();
        bad_index.indices[3] = 2;
        assert!(bad_index.check_invariants().is_err());

        let mut empty_palette = sample_frame();
        empty_palette.palette.clear();
        assert!(empty_palette.check_invariants().is_err());

        let mut short = sample_frame();
        short.indices.pop();
        assert!(short.check_invariants().is_err());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(FitGifError::EmptyInput.code(), "E_INPUT_EMPTY");
        assert_eq!(FitGifError::Cancelled.code(), "E_CANCELLED");
        assert!(FitGifError::Cancelled.is_cancelled());

        let failed = FitGifError::EncodeFailed {
            message: "exit status 1".into(),
        };
        assert!(!failed.is_cancelled());
        assert!(failed.to_string().starts_with("E_ENCODE_FAILED"));
    }
}
