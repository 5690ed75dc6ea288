//! Cooperative cancellation shared by the scheduler, its workers and the retry loop.
//!
//! The CLI trips the token on Ctrl-C. Workers stop taking new entries, the
//! transfer write callback aborts at the next buffer, and backoff sleeps end
//! early. Partial `.part` files are left on disk for the next run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable cancellation flag. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
