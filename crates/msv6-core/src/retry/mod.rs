//! Bounded retry with exponential backoff.
//!
//! One policy object drives both the registry listing calls made while
//! building a plan and the per-file transfers of the download stage. Errors
//! opt in through [`Retryable`], which maps them onto a coarse [`ErrorKind`].

mod classify;
mod policy;
mod run;

pub use classify::{classify_curl_error, classify_http_status, Retryable};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
