use std::sync::Arc;
use std::time::Duration;

use crate::FitGifError;

/// Bytes per RGBA8 pixel.
pub const CHANNELS: usize = 4;

/// One straight-alpha RGBA8 raster plus its display duration.
///
/// The pixel buffer is shared, never mutated: stages that need different
/// pixels build a new frame, stages that only retime reuse the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
    duration: Duration,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        pixels: impl Into<Arc<[u8]>>,
        duration: Duration,
    ) -> Result<Self, FitGifError> {
        let pixels = pixels.into();

        if width == 0 || height == 0 {
            return Err(FitGifError::InvalidFrame {
                message: format!("zero-sized frame {}x{}", width, height),
            });
        }

        let expected = width as usize * height as usize * CHANNELS;
        if pixels.len() != expected {
            return Err(FitGifError::InvalidFrame {
                message: format!(
                    "expected {} bytes ({}x{}x4), got {}",
                    expected,
                    width,
                    height,
                    pixels.len()
                ),
            });
        }

        if duration.is_zero() {
            return Err(FitGifError::InvalidFrame {
                message: "frame duration must be positive".to_string(),
            });
        }

        Ok(Self {
            width,
            height,
            pixels,
            duration,
        })
    }

    /// Frame filled with a single RGBA colour.
    pub fn solid(
        width: u32,
        height: u32,
        rgba: [u8; 4],
        duration: Duration,
    ) -> Result<Self, FitGifError> {
        let pixels = rgba.repeat(width as usize * height as usize);
        Self::new(width, height, pixels, duration)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Tightly packed RGBA8 bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// RGBA value at (x, y). Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Same raster, different duration. The pixel buffer is shared.
    pub fn with_duration(&self, duration: Duration) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels: Arc::clone(&self.pixels),
            duration,
        }
    }

    /// True when both frames point at the same pixel allocation.
    pub fn shares_pixels_with(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// Ordered, temporally sorted frames with uniform dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>) -> Result<Self, FitGifError> {
        if let Some(first) = frames.first() {
            let dims = first.dimensions();
            for (idx, frame) in frames.iter().enumerate().skip(1) {
                if frame.dimensions() != dims {
                    return Err(FitGifError::InvalidFrame {
                        message: format!(
                            "frame {} is {}x{}, sequence is {}x{}",
                            idx,
                            frame.width(),
                            frame.height(),
                            dims.0,
                            dims.1
                        ),
                    });
                }
            }
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Dimensions shared by every frame, `None` for an empty sequence.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(Frame::dimensions)
    }

    pub fn total_duration(&self) -> Duration {
        total_duration(&self.frames)
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Exact sum of frame durations.
pub fn total_duration(frames: &[Frame]) -> Duration {
    frames.iter().map(Frame::duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_validation() {
        let ms = Duration::from_millis(100);
        assert!(Frame::new(2, 2, vec![0u8; 16], ms).is_ok());
        assert!(Frame::new(2, 2, vec![0u8; 15], ms).is_err());
        assert!(Frame::new(0, 2, Vec::<u8>::new(), ms).is_err());
        assert!(Frame::new(2, 2, vec![0u8; 16], Duration::ZERO).is_err());
    }

    #[test]
    fn test_with_duration_shares_buffer() {
        let frame = Frame::solid(4, 4, [10, 20, 30, 255], Duration::from_millis(40)).unwrap();
        let longer = frame.with_duration(Duration::from_millis(80));
        assert!(frame.shares_pixels_with(&longer));
        assert_eq!(longer.duration(), Duration::from_millis(80));
        assert_eq!(longer.pixel(3, 3), [10, 20, 30, 255]);
    }

    #[test]
    fn test_sequence_rejects_mixed_dimensions() {
        let ms = Duration::from_millis(50);
        let a = Frame::solid(4, 4, [0, 0, 0, 255], ms).unwrap();
        let b = Frame::solid(5, 4, [0, 0, 0, 255], ms).unwrap();
        let err = FrameSequence::new(vec![a.clone(), b]).unwrap_err();
        assert_eq!(err.code(), "E_INPUT_FRAME");

        let seq = FrameSequence::new(vec![a.clone(), a]).unwrap();
        assert_eq!(seq.dimensions(), Some((4, 4)));
        assert_eq!(seq.total_duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_empty_sequence_allowed() {
        let seq = FrameSequence::new(Vec::new()).unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.dimensions(), None);
        assert_eq!(seq.total_duration(), Duration::ZERO);
    }
}
