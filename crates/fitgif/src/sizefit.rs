use std::time::Instant;

use fitgif_types::{
    AttemptSummary, EncodeAttemptResult, EncodeOptions, FitGifError, FitOutcome, FitStatus, Frame,
};
use tracing::{info, warn};

use crate::attempt::{AttemptRunner, PrepCache};
use crate::degrade::{DegradationPolicy, Knob};
use crate::progress::ProgressTracker;

/// Controller states. `Satisfied` and `Exhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FitState {
    Initial,
    Attempting,
    Degrading,
    Satisfied,
    Exhausted,
}

/// Re-encodes under progressively cheaper settings until the artifact fits
/// the budget, every knob is at its floor, or the retry ceiling is reached.
pub(crate) struct SizeFitController<'a> {
    pub policy: &'a DegradationPolicy,
    pub runner: AttemptRunner<'a>,
}

impl SizeFitController<'_> {
    pub(crate) fn run(
        &self,
        source: &[Frame],
        options: &EncodeOptions,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<FitOutcome, FitGifError> {
        if source.is_empty() {
            return Err(FitGifError::EmptyInput);
        }

        let mut state = FitState::Initial;
        let mut current = options.clone();
        let mut turned: Option<Knob> = None;
        let mut cursor = 0usize;
        let mut attempt = 0u32;
        let mut cache = PrepCache::default();
        let mut best: Option<EncodeAttemptResult> = None;
        let mut history = Vec::new();

        loop {
            state = match state {
                FitState::Initial => FitState::Attempting,

                FitState::Attempting => {
                    self.runner.cancel.check()?;
                    attempt += 1;
                    tracker.begin_attempt(attempt);

                    let started = Instant::now();
                    let result = self.runner.run(source, &current, &mut cache, tracker)?;

                    history.push(AttemptSummary {
                        attempt,
                        degraded: turned.map(|knob| knob.as_str().to_string()),
                        size_bytes: result.achieved_size_bytes,
                        frame_count: result.frame_count,
                        width: result.width,
                        height: result.height,
                        max_colors: current.max_colors,
                        similarity_threshold: current.similarity_threshold,
                        processing_time_ms: started.elapsed().as_millis() as u64,
                    });

                    let within_budget = result.within_budget;
                    if best
                        .as_ref()
                        .map_or(true, |b| result.achieved_size_bytes < b.achieved_size_bytes)
                    {
                        best = Some(result);
                    }

                    if within_budget {
                        FitState::Satisfied
                    } else if attempt >= self.policy.max_attempts {
                        FitState::Exhausted
                    } else {
                        FitState::Degrading
                    }
                }

                FitState::Degrading => match self.policy.next(&current, source, &mut cursor) {
                    Some((knob, next)) => {
                        info!(
                            stage = "sizefit",
                            attempt,
                            knob = knob.as_str(),
                            max_colors = next.max_colors,
                            max_width = next.max_width_pixels,
                            similarity = next.similarity_threshold,
                            "Degrading settings"
                        );
                        current = next;
                        turned = Some(knob);
                        FitState::Attempting
                    }
                    None => FitState::Exhausted,
                },

                FitState::Satisfied | FitState::Exhausted => break,
            };
        }

        let best = best.ok_or_else(|| FitGifError::EncodeFailed {
            message: "no attempt completed".to_string(),
        })?;

        let status = if state == FitState::Satisfied {
            FitStatus::Satisfied
        } else {
            warn!(
                stage = "sizefit",
                attempts = attempt,
                best_bytes = best.achieved_size_bytes,
                budget_bytes = options.size_budget_bytes(),
                "Size budget unmet, returning smallest artifact"
            );
            FitStatus::Exhausted
        };

        Ok(FitOutcome {
            best,
            status,
            attempts: attempt,
            history,
        })
    }
}
