//! Floyd–Steinberg error diffusion and centre-focus weighting.

use fitgif_types::CHANNELS;

/// Weight at the image corners when centre focus is on.
pub const EDGE_WEIGHT: f32 = 0.25;

/// Radial weight: 1.0 at the centre, `EDGE_WEIGHT` at the corners.
pub fn center_weight(x: u32, y: u32, width: u32, height: u32) -> f32 {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let max_r = (cx * cx + cy * cy).sqrt();
    if max_r == 0.0 {
        return 1.0;
    }
    let dx = x as f32 - cx;
    let dy = y as f32 - cy;
    let r = (dx * dx + dy * dy).sqrt() / max_r;
    1.0 - (1.0 - EDGE_WEIGHT) * r.min(1.0)
}

/// Per-pixel importance map (0..=255) favouring the centre.
pub fn center_importance_map(width: u32, height: u32) -> Vec<u8> {
    let mut map = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            map.push((center_weight(x, y, width, height) * 255.0).round() as u8);
        }
    }
    map
}

/// Maps `rgba` pixels to palette indices with Floyd–Steinberg diffusion of
/// the RGB error, scaled by `level` (0 = plain nearest colour). Alpha is
/// looked up as-is.
pub fn floyd_steinberg<F>(
    rgba: &[u8],
    width: u32,
    height: u32,
    palette: &[[u8; 4]],
    level: f32,
    center_focus: bool,
    mut lookup: F,
) -> Vec<u8>
where
    F: FnMut([u8; 4]) -> u8,
{
    let w = width as usize;
    let h = height as usize;
    let pixel_count = w * h;
    let mut indices = Vec::with_capacity(pixel_count);

    if level <= 0.0 {
        for px in rgba.chunks_exact(CHANNELS) {
            indices.push(lookup([px[0], px[1], px[2], px[3]]));
        }
        return indices;
    }

    // Error carried into the current and next row, RGB only.
    let mut error = vec![[0f32; 3]; pixel_count];

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let idx = i * CHANNELS;

            // Apply accumulated error
            let mut wanted = [0u8; 4];
            for c in 0..3 {
                wanted[c] = (rgba[idx + c] as f32 + error[i][c]).round().clamp(0.0, 255.0) as u8;
            }
            wanted[3] = rgba[idx + 3];

            let index = lookup(wanted);
            indices.push(index);

            let strength = if center_focus {
                level * center_weight(x as u32, y as u32, width, height)
            } else {
                level
            };

            let chosen = palette[index as usize];
            let err = [
                (wanted[0] as f32 - chosen[0] as f32) * strength,
                (wanted[1] as f32 - chosen[1] as f32) * strength,
                (wanted[2] as f32 - chosen[2] as f32) * strength,
            ];

            // Right: 7/16
            if x + 1 < w {
                spread(&mut error[i + 1], err, 7.0 / 16.0);
            }
            if y + 1 < h {
                // Below-left: 3/16
                if x > 0 {
                    spread(&mut error[i + w - 1], err, 3.0 / 16.0);
                }
                // Below: 5/16
                spread(&mut error[i + w], err, 5.0 / 16.0);
                // Below-right: 1/16
                if x + 1 < w {
                    spread(&mut error[i + w + 1], err, 1.0 / 16.0);
                }
            }
        }
    }

    indices
}

fn spread(target: &mut [f32; 3], err: [f32; 3], factor: f32) {
    for c in 0..3 {
        target[c] += err[c] * factor;
    }
}
