use std::time::Instant;

use fitgif_types::{EncodeAttemptResult, EncodeOptions, FitGifError, Frame, QuantizedFrame};
use gif_container::ContainerEncoder;
use palette_quant::{quantize, Quantizer};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::progress::{ProgressTracker, Stage};

/// Reduced and scaled frames of the last attempt, keyed by the settings that
/// shaped them.
#[derive(Default)]
pub(crate) struct PrepCache {
    key: Option<(u32, u32)>,
    frames: Vec<Frame>,
}

impl PrepCache {
    fn key_of(options: &EncodeOptions) -> (u32, u32) {
        (options.similarity_threshold.to_bits(), options.max_width_pixels)
    }
}

/// Runs one Reduce → Scale → Quantize → Encode pass.
pub(crate) struct AttemptRunner<'a> {
    pub quantizer: &'a dyn Quantizer,
    pub container: &'a dyn ContainerEncoder,
    pub pool: &'a ThreadPool,
    pub cancel: &'a CancelToken,
}

impl AttemptRunner<'_> {
    pub(crate) fn run(
        &self,
        source: &[Frame],
        options: &EncodeOptions,
        cache: &mut PrepCache,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<EncodeAttemptResult, FitGifError> {
        let started = Instant::now();

        let frames = self.prepare(source, options, cache, tracker)?;
        let quantized = self.quantize_all(frames, options, tracker)?;

        self.cancel.check()?;
        let cancel = self.cancel;
        let mut on_frame = |done: usize, total: usize| {
            tracker.report(Stage::Encode, done as f32 / total.max(1) as f32);
            !cancel.is_cancelled()
        };
        let bytes = self
            .container
            .encode(&quantized, options.loop_count, &mut on_frame)?;

        let (width, height) = frames.first().map(Frame::dimensions).unwrap_or((0, 0));
        let achieved_size_bytes = bytes.len() as u64;

        info!(
            stage = "attempt",
            container = self.container.name(),
            frames = quantized.len(),
            width,
            height,
            size_bytes = achieved_size_bytes,
            processing_ms = started.elapsed().as_millis() as u64,
            "Attempt encoded"
        );

        Ok(EncodeAttemptResult {
            bytes,
            achieved_size_bytes,
            within_budget: options.fits_budget(achieved_size_bytes),
            settings_used: options.clone(),
            frame_count: quantized.len(),
            width,
            height,
        })
    }

    fn prepare<'c>(
        &self,
        source: &[Frame],
        options: &EncodeOptions,
        cache: &'c mut PrepCache,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<&'c [Frame], FitGifError> {
        let key = PrepCache::key_of(options);

        if cache.key == Some(key) {
            debug!(stage = "reduce", frames = cache.frames.len(), "Reusing prepared frames");
            tracker.report(Stage::Reduce, 1.0);
            tracker.report(Stage::Scale, 1.0);
            return Ok(&cache.frames);
        }

        cache.key = None;
        self.cancel.check()?;
        tracker.report(Stage::Reduce, 0.0);
        let reduced = frame_ops::reduce(source, options.similarity_threshold);
        tracker.report(Stage::Reduce, 1.0);

        self.cancel.check()?;
        let scaled = self
            .pool
            .install(|| frame_ops::scale(&reduced, options.max_width_pixels))?;
        tracker.report(Stage::Scale, 1.0);

        cache.frames = scaled;
        cache.key = Some(key);
        Ok(&cache.frames)
    }

    /// Quantizes in batches of one frame per worker, checking for
    /// cancellation and reporting progress between batches.
    fn quantize_all(
        &self,
        frames: &[Frame],
        options: &EncodeOptions,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<Vec<QuantizedFrame>, FitGifError> {
        let total = frames.len();
        let batch_size = self.pool.current_num_threads().max(1);
        let quantizer = self.quantizer;
        let mut quantized = Vec::with_capacity(total);

        tracker.report(Stage::Quantize, 0.0);
        for (batch_idx, batch) in frames.chunks(batch_size).enumerate() {
            self.cancel.check()?;

            let out: Vec<QuantizedFrame> = self.pool.install(|| {
                batch
                    .par_iter()
                    .map(|frame| quantize(frame, options, quantizer))
                    .collect()
            });
            quantized.extend(out);

            debug!(
                stage = "quantize",
                batch = batch_idx,
                done = quantized.len(),
                total,
                "Batch quantized"
            );
            tracker.report(Stage::Quantize, quantized.len() as f32 / total.max(1) as f32);
        }

        Ok(quantized)
    }
}
