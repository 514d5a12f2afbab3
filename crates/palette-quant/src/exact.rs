use std::collections::HashMap;

use fitgif_types::{Frame, CHANNELS};

use crate::Remapped;

fn pack(px: &[u8]) -> u32 {
    u32::from_be_bytes([px[0], px[1], px[2], px[3]])
}

fn unpack(color: u32) -> [u8; 4] {
    color.to_be_bytes()
}

/// Lossless 1:1 palette in first-seen order, or `None` when the frame has
/// more than `limit` distinct colours.
pub fn exact_palette(frame: &Frame, limit: usize) -> Option<Remapped> {
    let limit = limit.min(256);
    let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(limit);
    let mut palette = Vec::with_capacity(limit);
    let mut indices = Vec::with_capacity(frame.pixel_count());

    for px in frame.pixels().chunks_exact(CHANNELS) {
        let color = pack(px);
        let index = match lookup.get(&color) {
            Some(&index) => index,
            None => {
                if palette.len() == limit {
                    return None;
                }
                let index = palette.len() as u8;
                palette.push(unpack(color));
                lookup.insert(color, index);
                index
            }
        };
        indices.push(index);
    }

    if palette.is_empty() {
        palette.push([0, 0, 0, 0]);
    }

    Some(Remapped { palette, indices })
}

/// Frequency-ranked palette with nearest-colour mapping.
///
/// Used when a backend cannot produce a result. Cannot fail; a 0-area raster
/// yields a single transparent entry and no indices.
pub fn popularity_quantize(frame: &Frame, max_colors: usize) -> Remapped {
    let max_colors = max_colors.clamp(1, 256);

    let mut color_freq: HashMap<u32, u32> = HashMap::new();
    for px in frame.pixels().chunks_exact(CHANNELS) {
        *color_freq.entry(pack(px)).or_insert(0) += 1;
    }

    if color_freq.is_empty() {
        return Remapped {
            palette: vec![[0, 0, 0, 0]],
            indices: Vec::new(),
        };
    }

    // Most frequent first; ties broken by colour value for determinism.
    let mut sorted: Vec<(u32, u32)> = color_freq.into_iter().collect();
    sorted.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    sorted.truncate(max_colors);

    let palette: Vec<[u8; 4]> = sorted.iter().map(|&(color, _)| unpack(color)).collect();

    let mut cache: HashMap<u32, u8> = HashMap::new();
    let indices = frame
        .pixels()
        .chunks_exact(CHANNELS)
        .map(|px| {
            let color = pack(px);
            *cache
                .entry(color)
                .or_insert_with(|| nearest_index(unpack(color), &palette))
        })
        .collect();

    Remapped { palette, indices }
}

/// Index of the palette entry closest to `rgba` (squared RGBA distance).
pub fn nearest_index(rgba: [u8; 4], palette: &[[u8; 4]]) -> u8 {
    let mut min_dist = u32::MAX;
    let mut best_idx = 0u8;

    for (i, entry) in palette.iter().enumerate() {
        let dist: u32 = rgba
            .iter()
            .zip(entry)
            .map(|(&a, &b)| {
                let d = a.abs_diff(b) as u32;
                d * d
            })
            .sum();

        if dist < min_dist {
            min_dist = dist;
            best_idx = i as u8;
        }
    }

    best_idx
}
