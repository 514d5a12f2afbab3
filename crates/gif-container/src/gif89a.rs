use std::borrow::Cow;

use fitgif_types::QuantizedFrame;
use gif::{DisposalMethod, Encoder, Frame, Repeat};
use tracing::{debug, info};

use crate::timing::delays_centiseconds;
use crate::{ContainerEncoder, ContainerError};

/// Palette entries with alpha below this become the frame's transparent index.
pub const TRANSPARENCY_THRESHOLD: u8 = 128;

/// In-process GIF89a encoder: per-frame local colour table, LZW via the
/// `gif` crate, NETSCAPE2.0 loop extension.
#[derive(Debug, Clone)]
pub struct GifContainer {
    transparency_threshold: u8,
}

impl Default for GifContainer {
    fn default() -> Self {
        Self {
            transparency_threshold: TRANSPARENCY_THRESHOLD,
        }
    }
}

impl GifContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transparency_threshold(mut self, threshold: u8) -> Self {
        self.transparency_threshold = threshold;
        self
    }

    /// Index buffer with every palette entry below the threshold folded into
    /// the first such entry, plus that entry's index. GIF frames carry a
    /// single transparent index.
    fn fold_transparent<'f>(&self, frame: &'f QuantizedFrame) -> (Cow<'f, [u8]>, Option<u8>) {
        let clear: Vec<bool> = frame
            .palette
            .iter()
            .map(|c| c[3] < self.transparency_threshold)
            .collect();
        let Some(first) = clear.iter().position(|&c| c) else {
            return (Cow::Borrowed(&frame.indices), None);
        };
        let first = first as u8;

        if clear.iter().filter(|&&c| c).count() == 1 {
            return (Cow::Borrowed(&frame.indices), Some(first));
        }

        let folded = frame
            .indices
            .iter()
            .map(|&i| if clear[i as usize] { first } else { i })
            .collect();
        (Cow::Owned(folded), Some(first))
    }
}

/// Logical screen size: the largest frame extent.
fn screen_size(frames: &[QuantizedFrame]) -> Result<(u16, u16), ContainerError> {
    let width = frames.iter().map(|f| f.width).max().unwrap_or(0);
    let height = frames.iter().map(|f| f.height).max().unwrap_or(0);
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(ContainerError::InvalidInput(format!(
            "{}x{} exceeds the GIF limit of 65535x65535",
            width, height
        ))),
    }
}

impl ContainerEncoder for GifContainer {
    fn name(&self) -> &'static str {
        "gif89a"
    }

    #[tracing::instrument(
        level = "info",
        skip(self, frames, progress),
        fields(frames = frames.len())
    )]
    fn encode(
        &self,
        frames: &[QuantizedFrame],
        loop_count: u16,
        progress: &mut dyn FnMut(usize, usize) -> bool,
    ) -> Result<Vec<u8>, ContainerError> {
        if frames.is_empty() {
            return Err(ContainerError::InvalidInput("no frames provided".to_string()));
        }

        let (width, height) = screen_size(frames)?;
        let durations: Vec<_> = frames.iter().map(|f| f.duration).collect();
        let delays = delays_centiseconds(&durations);
        let total = frames.len();

        let mut output = Vec::new();
        let mut encoder = Encoder::new(&mut output, width, height, &[])?;

        // NETSCAPE2.0 extension
        encoder.set_repeat(match loop_count {
            0 => Repeat::Infinite,
            n => Repeat::Finite(n),
        })?;

        for (idx, (frame, &delay)) in frames.iter().zip(&delays).enumerate() {
            frame.check_invariants().map_err(|reason| {
                ContainerError::InvalidInput(format!("frame {}: {}", idx, reason))
            })?;

            let (indices, transparent) = self.fold_transparent(frame);

            let mut gif_frame = Frame::default();
            gif_frame.width = frame.width as u16;
            gif_frame.height = frame.height as u16;
            gif_frame.buffer = indices;
            gif_frame.palette = Some(frame.palette_rgb());
            gif_frame.transparent = transparent;
            gif_frame.delay = delay;
            gif_frame.dispose = if transparent.is_some() {
                DisposalMethod::Background
            } else {
                DisposalMethod::Keep
            };

            encoder.write_frame(&gif_frame)?;

            debug!(
                stage = "encode",
                frame_idx = idx,
                delay_cs = delay,
                lct = frame.palette.len(),
                "Frame written"
            );

            if !progress(idx + 1, total) {
                return Err(ContainerError::Aborted);
            }
        }

        // Writes the trailer
        drop(encoder);

        info!(
            stage = "encode",
            frames = total,
            size_bytes = output.len(),
            "GIF89a encoding complete"
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn checkerboard(width: u32, height: u32, ms: u64) -> QuantizedFrame {
        QuantizedFrame {
            width,
            height,
            indices: (0..width * height).map(|i| ((i + i / width) % 2) as u8).collect(),
            palette: vec![[0, 0, 0, 255], [255, 255, 255, 255]],
            duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_header_and_trailer() {
        let frames = vec![checkerboard(8, 8, 100); 3];
        let bytes = GifContainer::new().encode(&frames, 0, &mut |_, _| true).unwrap();
        assert_eq!(&bytes[0..6], b"GIF89a");
        assert_eq!(bytes[bytes.len() - 1], 0x3B);
        assert!(bytes.windows(11).any(|w| w == b"NETSCAPE2.0"));
    }

    #[test]
    fn test_progress_called_per_frame() {
        let frames = vec![checkerboard(4, 4, 50); 5];
        let mut calls = Vec::new();
        GifContainer::new()
            .encode(&frames, 0, &mut |done, total| {
                calls.push((done, total));
                true
            })
            .unwrap();
        assert_eq!(calls, (1..=5).map(|i| (i, 5)).collect::<Vec<_>>());
    }

    #[test]
    fn test_abort_from_progress() {
        let frames = vec![checkerboard(4, 4, 50); 5];
        let result = GifContainer::new().encode(&frames, 0, &mut |done, _| done < 2);
        assert!(matches!(result, Err(ContainerError::Aborted)));
    }

    #[test]
    fn test_rejects_invalid_frames() {
        assert!(GifContainer::new().encode(&[], 0, &mut |_, _| true).is_err());

        let mut bad = checkerboard(4, 4, 50);
        bad.indices[0] = 7;
        let result = GifContainer::new().encode(&[bad], 0, &mut |_, _| true);
        assert!(matches!(result, Err(ContainerError::InvalidInput(_))));
    }

    #[test]
    fn test_transparent_index() {
        let mut frame = checkerboard(4, 4, 50);
        frame.palette[1] = [0, 0, 0, 0];
        let (indices, transparent) = GifContainer::new().fold_transparent(&frame);
        assert_eq!(transparent, Some(1));
        assert!(matches!(indices, Cow::Borrowed(_)));

        let (_, none) = GifContainer::new().fold_transparent(&checkerboard(4, 4, 50));
        assert_eq!(none, None);
    }

    #[test]
    fn test_all_clear_entries_become_transparent() {
        let frame = QuantizedFrame {
            width: 3,
            height: 1,
            indices: vec![0, 1, 2],
            palette: vec![[200, 0, 0, 255], [0, 255, 0, 0], [0, 0, 255, 40]],
            duration: Duration::from_millis(100),
        };
        let (indices, transparent) = GifContainer::new().fold_transparent(&frame);
        assert_eq!(transparent, Some(1));
        assert_eq!(&indices[..], &[0, 1, 1]);

        let bytes = GifContainer::new().encode(&[frame], 0, &mut |_, _| true).unwrap();
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(bytes.as_slice()).unwrap();
        let decoded = decoder.read_next_frame().unwrap().unwrap();
        let alphas: Vec<u8> = decoded.buffer.chunks_exact(4).map(|px| px[3]).collect();
        assert_eq!(alphas, vec![255, 0, 0]);
    }
}
