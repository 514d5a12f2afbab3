use fitgif_types::{FitGifError, Frame};
use image::{imageops::FilterType, ImageBuffer, Rgba};
use rayon::prelude::*;
use tracing::info;

/// Output size for a `width`×`height` raster bounded to `max_width`, keeping
/// the aspect ratio. `None` when no scaling is needed.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> Option<(u32, u32)> {
    if max_width == 0 || width <= max_width {
        return None;
    }
    let scaled_height = (height as f64 * max_width as f64 / width as f64).round() as u32;
    Some((max_width, scaled_height.max(1)))
}

/// Downscales every frame to at most `max_width` pixels wide with a Lanczos3
/// filter. The first frame's width decides the scale factor; durations are
/// carried over untouched.
#[tracing::instrument(level = "info", skip(frames), fields(frames = frames.len()))]
pub fn scale(frames: &[Frame], max_width: u32) -> Result<Vec<Frame>, FitGifError> {
    let Some(first) = frames.first() else {
        return Ok(Vec::new());
    };

    let Some((out_width, out_height)) = scaled_dimensions(first.width(), first.height(), max_width)
    else {
        return Ok(frames.to_vec());
    };

    info!(
        stage = "scale",
        method = "Lanczos3",
        input = %format!("{}x{}", first.width(), first.height()),
        output = %format!("{}x{}", out_width, out_height),
        "Downscaling frames"
    );

    frames
        .par_iter()
        .map(|frame| resize_frame(frame, out_width, out_height))
        .collect()
}

fn resize_frame(frame: &Frame, width: u32, height: u32) -> Result<Frame, FitGifError> {
    let (width_in, height_in) = frame.dimensions();
    let source = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(width_in, height_in, frame.pixels())
        .ok_or_else(|| FitGifError::InvalidFrame {
            message: format!(
                "pixel buffer does not match {}x{}",
                frame.width(),
                frame.height()
            ),
        })?;

    let resized = image::imageops::resize(&source, width, height, FilterType::Lanczos3);
    Frame::new(width, height, resized.into_raw(), frame.duration())
}
