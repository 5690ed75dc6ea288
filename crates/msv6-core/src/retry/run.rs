//! Retry loop: run a closure until success or policy says stop.

use std::time::{Duration, Instant};

use super::classify::Retryable;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::CancelToken;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Runs `f` until it succeeds or the retry policy says to stop.
///
/// `f` receives the 1-based attempt number. On a retryable failure the loop
/// sleeps for the backoff delay; the sleep ends early when `cancel` fires and
/// the last error is returned.
pub fn run_with_retry<T, E, F>(policy: &RetryPolicy, cancel: Option<&CancelToken>, mut f: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let mut attempt = 1u32;
    loop {
        let err = match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        match policy.decide(attempt, err.retry_kind()) {
            RetryDecision::NoRetry => return Err(err),
            RetryDecision::RetryAfter(d) => {
                tracing::debug!(attempt, delay_ms = d.as_millis() as u64, error = %err, "retrying");
                if !sleep_unless_cancelled(d, cancel) {
                    return Err(err);
                }
                attempt += 1;
            }
        }
    }
}

/// Returns false when cancelled before the delay elapsed.
fn sleep_unless_cancelled(delay: Duration, cancel: Option<&CancelToken>) -> bool {
    let Some(cancel) = cancel else {
        std::thread::sleep(delay);
        return true;
    };
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
