//! Per-entry resumable fetch.
//!
//! Bytes land in `<dest>.part` and are renamed onto `<dest>` only after the
//! body is complete and its length matches the plan. Transient failures are
//! retried through [`run_with_retry`]; each retry continues from the current
//! `.part` length.

mod error;
mod resume;
mod transfer;

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::address::{AddressFamily, AddressFamilySelector, AddressPolicy};
use crate::control::CancelToken;
use crate::plan::FileEntry;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::storage::{self, StorageWriter};

pub use error::{FetchError, FetchErrorKind};
use resume::{prepare, remove_if_exists, LocalState};
use transfer::{transfer, Transferred};

/// Options shared by every entry of a run.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub overwrite: bool,
    /// Treat a destination of the expected size as done without asking the
    /// server. Ignored when `overwrite` is set.
    pub skip_existing: bool,
    /// Fetch only entries that carry a raw URL, always through it.
    pub only_raw: bool,
    /// Fetch only entries without a raw URL.
    pub only_no_raw: bool,
    /// Connect timeout and stall timeout for each attempt.
    pub timeout: Duration,
    pub address_policy: AddressPolicy,
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            skip_existing: true,
            only_raw: false,
            only_no_raw: false,
            timeout: Duration::from_secs(60),
            address_policy: AddressPolicy::Auto,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStatus {
    Completed,
    SkippedExisting,
    /// Only-raw mode and the entry has no raw URL.
    SkippedNotRaw,
    /// Only-no-raw mode and the entry has a raw URL.
    SkippedHasRaw,
    Failed,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchStatus::Completed => "completed",
            FetchStatus::SkippedExisting => "skipped-existing",
            FetchStatus::SkippedNotRaw => "skipped-not-raw",
            FetchStatus::SkippedHasRaw => "skipped-has-raw",
            FetchStatus::Failed => "failed",
        })
    }
}

/// Result of one entry. `error` is set iff `status` is [`FetchStatus::Failed`].
#[derive(Debug)]
pub struct FetchOutcome {
    pub path: String,
    pub status: FetchStatus,
    /// Body bytes received over the network during this run.
    pub bytes_transferred: u64,
    pub error: Option<FetchError>,
    pub address_family: AddressFamily,
}

impl FetchOutcome {
    fn new(path: &str, status: FetchStatus, bytes_transferred: u64, address_family: AddressFamily) -> Self {
        Self {
            path: path.to_string(),
            status,
            bytes_transferred,
            error: None,
            address_family,
        }
    }

    fn failed(path: &str, error: FetchError, bytes_transferred: u64, address_family: AddressFamily) -> Self {
        Self {
            path: path.to_string(),
            status: FetchStatus::Failed,
            bytes_transferred,
            error: Some(error),
            address_family,
        }
    }
}

/// Fetches one plan entry below a destination root.
pub trait EntryFetcher: Send + Sync {
    fn fetch(&self, entry: &FileEntry, root: &Path, cancel: &CancelToken) -> FetchOutcome;
}

/// HTTP fetcher with resume, skip-if-complete and atomic finalize.
#[derive(Debug, Clone)]
pub struct ResumableFetcher {
    options: FetchOptions,
    selector: AddressFamilySelector,
}

impl ResumableFetcher {
    pub fn new(options: FetchOptions) -> Self {
        let selector = AddressFamilySelector::new(options.address_policy);
        Self { options, selector }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// URL to use and whether IPv6 is mandatory for it.
    ///
    /// The raw URL wins when only-raw mode is on, when IPv6 is preferred, or
    /// when it is the only URL. IPv6 is mandatory only when the raw URL is used
    /// because nothing else may be (only-raw mode or no primary URL).
    fn choose_url<'e>(&self, entry: &'e FileEntry) -> Option<(&'e str, bool)> {
        let prefer_raw = self.options.only_raw || self.selector.policy() == AddressPolicy::PreferIpv6;
        match (entry.url.as_deref(), entry.raw_url.as_deref()) {
            (_, Some(raw)) if self.options.only_raw => Some((raw, true)),
            (Some(_), Some(raw)) if prefer_raw => Some((raw, false)),
            (Some(url), _) => Some((url, false)),
            (None, Some(raw)) => Some((raw, true)),
            (None, None) => None,
        }
    }

    fn fetch_entry(&self, entry: &FileEntry, root: &Path, cancel: &CancelToken) -> FetchOutcome {
        let path = entry.path.as_str();
        let mut family = AddressFamily::Unknown;
        let mut received = 0u64;

        if self.options.only_raw && entry.raw_url.is_none() {
            return FetchOutcome::new(path, FetchStatus::SkippedNotRaw, 0, family);
        }
        if self.options.only_no_raw && entry.raw_url.is_some() {
            return FetchOutcome::new(path, FetchStatus::SkippedHasRaw, 0, family);
        }
        if cancel.is_cancelled() {
            return FetchOutcome::failed(path, FetchError::Cancelled, 0, family);
        }
        let Some((url, strict_ipv6)) = self.choose_url(entry) else {
            return FetchOutcome::failed(path, FetchError::RawUrlUnavailable, 0, family);
        };

        let dest = entry.local_path(root);
        let part = storage::temp_path(&dest);
        let state = match storage::ensure_parent(&dest)
            .and_then(|()| {
                prepare(
                    &dest,
                    &part,
                    entry.size,
                    self.options.overwrite,
                    self.options.skip_existing,
                )
            })
        {
            Ok(state) => state,
            Err(e) => return FetchOutcome::failed(path, FetchError::Storage(e), 0, family),
        };

        let opened = match state {
            LocalState::Complete => return FetchOutcome::new(path, FetchStatus::SkippedExisting, 0, family),
            LocalState::Fresh => StorageWriter::create(&part),
            LocalState::Resume(from) => {
                tracing::debug!(path, from, "resuming partial file");
                StorageWriter::open_resume(&part)
            }
            LocalState::Adopted(from) => {
                tracing::debug!(path, from, "continuing existing file");
                StorageWriter::open_resume(&part)
            }
        };
        let mut writer = match opened {
            Ok(w) => w,
            Err(e) => return FetchOutcome::failed(path, FetchError::Storage(e), 0, family),
        };

        // A previous run may have received every byte but stopped before the rename.
        let already_there = matches!(state, LocalState::Resume(_))
            && entry.size.is_some_and(|size| size == writer.len() && size > 0);
        let fetched = if already_there {
            Ok(Transferred::AlreadyComplete)
        } else {
            run_with_retry(&self.options.retry, Some(cancel), |attempt| {
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
                if attempt > 1 {
                    tracing::debug!(path, attempt, from = writer.len(), "retrying fetch");
                }
                let (result, peer) = self.selector.resolve_connection(strict_ipv6, |easy| {
                    transfer(easy, url, &mut writer, self.options.timeout, cancel, &mut received)
                });
                if peer.family != AddressFamily::Unknown {
                    family = peer.family;
                }
                result
            })
        };

        let finished = fetched.and_then(|how| {
            if let Some(expected) = entry.size {
                if writer.len() != expected {
                    return Err(FetchError::SizeMismatch {
                        expected,
                        actual: writer.len(),
                    });
                }
            }
            writer.sync()?;
            writer.finalize(&dest)?;
            Ok(how)
        });

        // The destination still holds the adopted bytes; drop the copy when
        // nothing new arrived.
        if finished.is_err() && received == 0 && matches!(state, LocalState::Adopted(_)) {
            if let Err(e) = remove_if_exists(&part) {
                tracing::debug!(path, error = %e, "could not remove adopted copy");
            }
        }

        match finished {
            Ok(Transferred::Body) => FetchOutcome::new(path, FetchStatus::Completed, received, family),
            Ok(Transferred::AlreadyComplete) if already_there => {
                FetchOutcome::new(path, FetchStatus::Completed, received, family)
            }
            Ok(Transferred::AlreadyComplete) => {
                FetchOutcome::new(path, FetchStatus::SkippedExisting, received, family)
            }
            Err(e) => FetchOutcome::failed(path, e, received, family),
        }
    }
}

impl EntryFetcher for ResumableFetcher {
    fn fetch(&self, entry: &FileEntry, root: &Path, cancel: &CancelToken) -> FetchOutcome {
        let outcome = self.fetch_entry(entry, root, cancel);
        match &outcome.error {
            None => tracing::info!(
                path = %outcome.path,
                status = %outcome.status,
                bytes = outcome.bytes_transferred,
                family = %outcome.address_family,
                "entry finished"
            ),
            Some(e) => tracing::warn!(
                path = %outcome.path,
                kind = %e.kind(),
                error = %e,
                bytes = outcome.bytes_transferred,
                family = %outcome.address_family,
                "entry failed"
            ),
        }
        outcome
    }
}
