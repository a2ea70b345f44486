use std::sync::{
    atomic::{
        AtomicBool,
        Ordering,
    },
    Arc,
};

use super::errors::SieveError;

/// Cooperative cancellation flag, shared between the host and the
/// running recalc job. Long loops poll it at fixed intervals.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), SieveError> {
        if self.is_cancelled() {
            Err(SieveError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Poll only every `interval`-th iteration to keep hot loops cheap.
    pub fn check_every(&self, counter: usize, interval: usize) -> Result<(), SieveError> {
        if interval == 0 || counter % interval == 0 {
            self.check()
        } else {
            Ok(())
        }
    }
}
