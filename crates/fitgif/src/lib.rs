//! Size-constrained animated GIF encoding.
//!
//! [`FitEncoder`] runs Reduce → Scale → Quantize → Encode and, when the
//! artifact exceeds `EncodeOptions::max_file_size_kb`, retries with cheaper
//! settings chosen by a [`DegradationPolicy`].

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tempfile::NamedTempFile;
use tracing::{info, info_span};
use uuid::Uuid;

mod attempt;
pub mod cancel;
pub mod degrade;
pub mod progress;
mod sizefit;

pub use cancel::CancelToken;
pub use degrade::{theoretical_bound, DegradationPolicy, Knob};
pub use progress::{NoProgress, Progress, ProgressSink, Stage};

pub use fitgif_types::{
    AttemptSummary, EncodeAttemptResult, EncodeOptions, FitGifError, FitOutcome, FitStatus, Frame,
    FrameSequence, QuantizedFrame,
};
pub use gif_container::{
    inspect_gif, CommandFilter, ContainerEncoder, ContainerError, GifContainer, GifInspection,
};
pub use palette_quant::{Quantizer, QuantizerKind};

use attempt::AttemptRunner;
use progress::ProgressTracker;
use sizefit::SizeFitController;

/// Encoding engine: quantizer backend, container encoder, degradation
/// policy and a dedicated worker pool. Cheap to share across threads; each
/// `encode` call owns its derived frames.
pub struct FitEncoder {
    quantizer: Arc<dyn Quantizer>,
    container: Arc<dyn ContainerEncoder>,
    policy: DegradationPolicy,
    pool: ThreadPool,
}

#[derive(Default)]
pub struct FitEncoderBuilder {
    quantizer: Option<Arc<dyn Quantizer>>,
    container: Option<Arc<dyn ContainerEncoder>>,
    policy: DegradationPolicy,
    threads: Option<usize>,
}

impl FitEncoderBuilder {
    pub fn quantizer_kind(mut self, kind: QuantizerKind) -> Self {
        self.quantizer = Some(kind.build());
        self
    }

    pub fn quantizer(mut self, quantizer: Arc<dyn Quantizer>) -> Self {
        self.quantizer = Some(quantizer);
        self
    }

    pub fn container(mut self, container: Arc<dyn ContainerEncoder>) -> Self {
        self.container = Some(container);
        self
    }

    pub fn policy(mut self, policy: DegradationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Worker threads for per-frame stages; 0 means one per core.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn build(self) -> Result<FitEncoder, FitGifError> {
        self.policy.validate()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads.unwrap_or(0))
            .thread_name(|idx| format!("fitgif-worker-{}", idx))
            .build()
            .map_err(|e| FitGifError::WorkerPool {
                message: e.to_string(),
            })?;

        let quantizer = self.quantizer.unwrap_or_else(|| QuantizerKind::default().build());
        let container = self
            .container
            .unwrap_or_else(|| Arc::new(GifContainer::new()) as Arc<dyn ContainerEncoder>);

        info!(
            quantizer = quantizer.name(),
            container = container.name(),
            threads = pool.current_num_threads(),
            max_attempts = self.policy.max_attempts,
            "FitEncoder ready"
        );

        Ok(FitEncoder {
            quantizer,
            container,
            policy: self.policy,
            pool,
        })
    }
}

impl FitEncoder {
    pub fn builder() -> FitEncoderBuilder {
        FitEncoderBuilder::default()
    }

    /// Engine with the default backends and policy.
    pub fn new() -> Result<Self, FitGifError> {
        Self::builder().build()
    }

    pub fn policy(&self) -> &DegradationPolicy {
        &self.policy
    }

    /// Encodes `frames` in memory.
    ///
    /// Fails only on empty input, invalid options, a container failure or
    /// cancellation; an unmet size budget is reported through
    /// [`FitOutcome::status`].
    pub fn encode(
        &self,
        frames: &FrameSequence,
        options: &EncodeOptions,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<FitOutcome, FitGifError> {
        let encode_id = Uuid::new_v4();
        let span = info_span!("fitgif_encode", %encode_id, frames = frames.len());
        let _guard = span.enter();

        if frames.is_empty() {
            return Err(FitGifError::EmptyInput);
        }
        options.validate()?;

        info!(
            stage = "encode",
            max_colors = options.max_colors,
            max_width = options.max_width_pixels,
            budget_kb = options.max_file_size_kb,
            similarity = options.similarity_threshold,
            "Starting encode"
        );

        let controller = SizeFitController {
            policy: &self.policy,
            runner: AttemptRunner {
                quantizer: self.quantizer.as_ref(),
                container: self.container.as_ref(),
                pool: &self.pool,
                cancel,
            },
        };

        let mut tracker = ProgressTracker::new(progress, self.policy.max_attempts);
        let result = controller.run(frames.frames(), options, &mut tracker);

        match &result {
            Ok(outcome) => {
                tracker.finish();
                info!(
                    stage = "encode",
                    status = ?outcome.status,
                    attempts = outcome.attempts,
                    size_bytes = outcome.best.achieved_size_bytes,
                    "Encode finished"
                );
            }
            Err(err) => info!(stage = "encode", code = err.code(), error = %err, "Encode stopped"),
        }

        result
    }

    /// Encodes `frames` and writes the artifact to `path`.
    ///
    /// The artifact goes to a temporary file beside `path` and is renamed
    /// into place only once complete, so failure or cancellation leaves
    /// nothing at `path`.
    pub fn encode_to_path(
        &self,
        frames: &FrameSequence,
        options: &EncodeOptions,
        path: impl AsRef<Path>,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<FitOutcome, FitGifError> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut staging = NamedTempFile::new_in(parent)?;
        let outcome = self.encode(frames, options, progress, cancel)?;

        staging.write_all(&outcome.best.bytes)?;
        staging.as_file().sync_all()?;
        cancel.check()?;

        staging.persist(path).map_err(|e| FitGifError::from(e.error))?;

        info!(
            path = %path.display(),
            size_bytes = outcome.best.achieved_size_bytes,
            "Artifact written"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sequence(count: usize) -> FrameSequence {
        let frames = (0..count)
            .map(|i| {
                Frame::solid(8, 8, [i as u8 * 20, 0, 0, 255], Duration::from_millis(100)).unwrap()
            })
            .collect();
        FrameSequence::new(frames).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let encoder = FitEncoder::builder().threads(1).build().unwrap();
        let result = encoder.encode(
            &FrameSequence::default(),
            &EncodeOptions::default(),
            &NoProgress,
            &CancelToken::new(),
        );
        assert_eq!(result.unwrap_err(), FitGifError::EmptyInput);
    }

    #[test]
    fn test_invalid_options() {
        let encoder = FitEncoder::builder().threads(1).build().unwrap();
        let options = EncodeOptions::default().with_max_colors(1);
        let err = encoder
            .encode(&sequence(2), &options, &NoProgress, &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.code(), "E_CONFIG_OPTIONS");
    }

    #[test]
    fn test_invalid_policy() {
        let result = FitEncoder::builder()
            .policy(DegradationPolicy::default().with_max_attempts(0))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_cancelled_before_start() {
        let encoder = FitEncoder::builder().threads(1).build().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = encoder
            .encode(&sequence(3), &EncodeOptions::default(), &NoProgress, &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_unconstrained_single_attempt() {
        let encoder = FitEncoder::builder().threads(2).build().unwrap();
        let outcome = encoder
            .encode(&sequence(4), &EncodeOptions::default(), &NoProgress, &CancelToken::new())
            .unwrap();
        assert_eq!(outcome.status, FitStatus::Satisfied);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.within_budget());
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.history[0].degraded, None);
        assert_eq!(&outcome.best.bytes[0..6], b"GIF89a");
    }
}
