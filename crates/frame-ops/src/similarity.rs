use fitgif_types::{Frame, CHANNELS};
use tracing::{debug, info};

/// Sample points per axis used by [`frame_distance`].
pub const SAMPLE_GRID: u32 = 16;

/// Cheap perceptual distance between two frames.
///
/// Mean absolute per-channel difference (0..=255) over a fixed grid of at
/// most `SAMPLE_GRID`² pixels, so the cost does not grow with resolution.
/// Frames of different size are maximally distant.
pub fn frame_distance(a: &Frame, b: &Frame) -> f32 {
    if a.dimensions() != b.dimensions() {
        return f32::INFINITY;
    }

    let (width, height) = a.dimensions();
    let xs = sample_positions(width);
    let ys = sample_positions(height);
    let pa = a.pixels();
    let pb = b.pixels();

    let mut total = 0u64;
    for &y in &ys {
        let row = y as usize * width as usize;
        for &x in &xs {
            let idx = (row + x as usize) * CHANNELS;
            for c in 0..CHANNELS {
                total += pa[idx + c].abs_diff(pb[idx + c]) as u64;
            }
        }
    }

    let samples = (xs.len() * ys.len() * CHANNELS) as f64;
    (total as f64 / samples) as f32
}

/// Centres of `SAMPLE_GRID` equal cells along an axis (every pixel when the
/// axis is shorter than the grid).
fn sample_positions(len: u32) -> Vec<u32> {
    let cells = SAMPLE_GRID.min(len).max(1);
    (0..cells)
        .map(|i| ((2 * i as u64 + 1) * len as u64 / (2 * cells as u64)) as u32)
        .collect()
}

/// Drops frames that are near-duplicates of the last kept frame and folds
/// their durations into it.
///
/// The first frame is always kept and the summed duration of the output
/// equals that of the input exactly. A threshold of 0 (or a sequence of at
/// most one frame) returns the input unchanged.
#[tracing::instrument(level = "debug", skip(frames), fields(frames = frames.len()))]
pub fn reduce(frames: &[Frame], threshold: f32) -> Vec<Frame> {
    if frames.len() <= 1 || !(threshold > 0.0) {
        return frames.to_vec();
    }

    let mut kept = Vec::with_capacity(frames.len());
    let mut anchor = &frames[0];
    let mut held = anchor.duration();

    for (idx, candidate) in frames.iter().enumerate().skip(1) {
        let distance = frame_distance(anchor, candidate);
        if distance < threshold {
            held += candidate.duration();
            debug!(stage = "reduce", frame_idx = idx, distance, "Merged into kept frame");
        } else {
            kept.push(anchor.with_duration(held));
            anchor = candidate;
            held = candidate.duration();
        }
    }
    kept.push(anchor.with_duration(held));

    info!(
        stage = "reduce",
        input_frames = frames.len(),
        kept_frames = kept.len(),
        threshold,
        "Similarity reduction completed"
    );

    kept
}

/// Number of frames [`reduce`] would keep at `threshold`, without building
/// them.
pub fn kept_count(frames: &[Frame], threshold: f32) -> usize {
    if frames.len() <= 1 || !(threshold > 0.0) {
        return frames.len();
    }

    let mut anchor = &frames[0];
    let mut kept = 1;
    for candidate in &frames[1..] {
        if frame_distance(anchor, candidate) >= threshold {
            anchor = candidate;
            kept += 1;
        }
    }
    kept
}
