use serde::Serialize;

/// Pipeline stage a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Reduce,
    Scale,
    Quantize,
    Encode,
    Done,
}

impl Stage {
    /// Share of one attempt's sweep covered by this stage.
    fn span(self) -> (f32, f32) {
        match self {
            Stage::Reduce => (0.0, 0.10),
            Stage::Scale => (0.10, 0.18),
            Stage::Quantize => (0.18, 0.75),
            Stage::Encode => (0.75, 1.0),
            Stage::Done => (1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub stage: Stage,
    /// Completion of `stage` within the current attempt, 0..=1.
    pub stage_fraction: f32,
    /// Completion of the whole encode call, 0..=1, never decreasing.
    pub overall: f32,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Receives progress reports on the thread driving the encode.
pub trait ProgressSink: Sync {
    fn report(&self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(Progress) + Sync,
{
    fn report(&self, progress: Progress) {
        self(progress)
    }
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: Progress) {}
}

/// Share of the overall sweep given to the first attempt; retries split
/// the rest evenly.
const FIRST_ATTEMPT_SHARE: f32 = 0.85;

/// Maps per-attempt stage fractions onto one monotonic overall fraction.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    max_attempts: u32,
    attempt: u32,
    window: (f32, f32),
    last: f32,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, max_attempts: u32) -> Self {
        Self {
            sink,
            max_attempts: max_attempts.max(1),
            attempt: 0,
            window: (0.0, FIRST_ATTEMPT_SHARE),
            last: 0.0,
        }
    }

    pub(crate) fn begin_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
        self.window = if attempt <= 1 {
            (0.0, FIRST_ATTEMPT_SHARE)
        } else {
            let retries = (self.max_attempts - 1).max(1) as f32;
            let share = (1.0 - FIRST_ATTEMPT_SHARE) / retries;
            let start = FIRST_ATTEMPT_SHARE + share * (attempt - 2) as f32;
            (start.min(1.0), (start + share).min(1.0))
        };
    }

    pub(crate) fn report(&mut self, stage: Stage, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        let (lo, hi) = stage.span();
        let within = lo + (hi - lo) * fraction;
        let overall = self.window.0 + (self.window.1 - self.window.0) * within;

        self.last = self.last.max(overall.min(1.0));
        self.sink.report(Progress {
            stage,
            stage_fraction: fraction,
            overall: self.last,
            attempt: self.attempt,
        });
    }

    pub(crate) fn finish(&mut self) {
        self.last = 1.0;
        self.sink.report(Progress {
            stage: Stage::Done,
            stage_fraction: 1.0,
            overall: 1.0,
            attempt: self.attempt,
        });
    }
}
