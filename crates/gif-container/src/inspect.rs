use std::io::Cursor;

use gif::{ColorOutput, DecodeOptions};
use serde::Serialize;

use crate::ContainerError;

/// Structural summary of an encoded GIF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GifInspection {
    pub width: u16,
    pub height: u16,
    pub frame_count: usize,
    pub delays_cs: Vec<u16>,
    pub total_delay_cs: u64,
    pub has_netscape_loop: bool,
    /// Largest colour table (local or global) in entries.
    pub max_palette_len: usize,
}

/// Decodes `bytes` and reports frame count, delays and palette sizes.
pub fn inspect_gif(bytes: &[u8]) -> Result<GifInspection, ContainerError> {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::Indexed);
    let mut decoder = options.read_info(Cursor::new(bytes))?;

    let width = decoder.width();
    let height = decoder.height();
    let global_len = decoder.global_palette().map(|p| p.len() / 3).unwrap_or(0);

    let mut delays_cs = Vec::new();
    let mut max_palette_len = global_len;
    while let Some(frame) = decoder.read_next_frame()? {
        delays_cs.push(frame.delay);
        if let Some(palette) = &frame.palette {
            max_palette_len = max_palette_len.max(palette.len() / 3);
        }
    }

    Ok(GifInspection {
        width,
        height,
        frame_count: delays_cs.len(),
        total_delay_cs: delays_cs.iter().map(|&d| d as u64).sum(),
        delays_cs,
        has_netscape_loop: bytes.windows(11).any(|w| w == b"NETSCAPE2.0"),
        max_palette_len,
    })
}
