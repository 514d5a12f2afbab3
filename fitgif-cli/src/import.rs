use std::fs::{read_dir, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use fitgif::{Frame, FrameSequence};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Camera frame as written by the capture app.
#[derive(Serialize, Deserialize, Debug)]
pub struct CameraFrame {
    pub w: u32,
    pub h: u32,
    /// "RGBA8888" or "BGRA8888".
    pub format: String,
    /// Row stride in bytes, may include padding.
    pub stride: u32,
    pub ts_ms: u64,
    #[serde(default)]
    pub frame_index: u32,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// Tightly packed straight RGBA, stride padding removed.
    pub fn to_tight_rgba(&self) -> Result<Vec<u8>> {
        let row_bytes = self.w as usize * 4;
        let stride = self.stride as usize;
        if stride < row_bytes {
            bail!("stride {} is shorter than a {}px row", stride, self.w);
        }
        let needed = stride * (self.h as usize).saturating_sub(1) + row_bytes;
        if self.data.len() < needed {
            bail!(
                "{} data bytes, {}x{} at stride {} needs {}",
                self.data.len(),
                self.w,
                self.h,
                stride,
                needed
            );
        }

        let swap = match self.format.as_str() {
            "RGBA8888" => false,
            "BGRA8888" => true,
            other => bail!("unsupported pixel format '{}'", other),
        };

        let mut tight = Vec::with_capacity(row_bytes * self.h as usize);
        for row in self.data.chunks(stride).take(self.h as usize) {
            tight.extend_from_slice(&row[..row_bytes]);
        }
        if swap {
            tight.chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
        }
        Ok(tight)
    }
}

/// Loads a directory of `.cbor` camera frames, or failing that `.png`
/// files, in file-name order.
pub fn load_frames(dir: &Path, fallback_delay: Duration) -> Result<FrameSequence> {
    let cbor = list_with_extension(dir, "cbor")?;
    let frames = if !cbor.is_empty() {
        load_cbor(&cbor, fallback_delay)?
    } else {
        let png = list_with_extension(dir, "png")?;
        if png.is_empty() {
            bail!("no .cbor or .png frames in {}", dir.display());
        }
        load_png(&png, fallback_delay)?
    };

    info!(frames = frames.len(), dir = %dir.display(), "Frames imported");
    FrameSequence::new(frames).map_err(|e| anyhow!(e))
}

fn list_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map_or(false, |e| e.eq_ignore_ascii_case(ext))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn load_png(paths: &[PathBuf], delay: Duration) -> Result<Vec<Frame>> {
    paths
        .iter()
        .map(|path| {
            let rgba = image::open(path)
                .with_context(|| format!("Failed to decode {}", path.display()))?
                .to_rgba8();
            let (w, h) = rgba.dimensions();
            debug!(path = %path.display(), w, h, "PNG frame");
            Frame::new(w, h, rgba.into_raw(), delay).map_err(|e| anyhow!(e))
        })
        .collect()
}

fn load_cbor(paths: &[PathBuf], fallback_delay: Duration) -> Result<Vec<Frame>> {
    let mut raw = Vec::with_capacity(paths.len());
    for path in paths {
        let file = File::open(path)?;
        let frame: CameraFrame = serde_cbor::from_reader(file)
            .with_context(|| format!("Failed to parse CBOR: {}", path.display()))?;
        debug!(
            path = %path.display(),
            frame_index = frame.frame_index,
            w = frame.w,
            h = frame.h,
            stride = frame.stride,
            "CBOR frame"
        );
        raw.push(frame);
    }

    let timestamps: Vec<u64> = raw.iter().map(|f| f.ts_ms).collect();
    let durations = durations_from_timestamps(&timestamps, fallback_delay);

    raw.iter()
        .zip(durations)
        .map(|(frame, duration)| {
            let pixels = frame.to_tight_rgba()?;
            Frame::new(frame.w, frame.h, pixels, duration).map_err(|e| anyhow!(e))
        })
        .collect()
}

/// Display durations from capture timestamps: each frame lasts until the
/// next one. The last frame repeats the previous interval. Non-increasing
/// timestamps fall back to `fallback`.
pub fn durations_from_timestamps(ts_ms: &[u64], fallback: Duration) -> Vec<Duration> {
    let mut durations: Vec<Duration> = ts_ms
        .windows(2)
        .map(|pair| match pair[1].checked_sub(pair[0]) {
            Some(delta) if delta > 0 => Duration::from_millis(delta),
            _ => {
                warn!(
                    from = pair[0],
                    to = pair[1],
                    "Non-increasing timestamps, using fallback delay"
                );
                fallback
            }
        })
        .collect();

    if !ts_ms.is_empty() {
        durations.push(durations.last().copied().unwrap_or(fallback));
    }
    durations
}
