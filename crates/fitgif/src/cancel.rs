use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fitgif_types::FitGifError;

/// Caller-settable cancellation flag, checked at batch and attempt
/// boundaries. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), FitGifError> {
        if self.is_cancelled() {
            Err(FitGifError::Cancelled)
        } else {
            Ok(())
        }
    }
}
