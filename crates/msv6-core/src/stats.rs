//! Reduce per-entry outcomes into a run summary.

use serde::Serialize;
use std::time::Duration;

use crate::address::AddressFamily;
use crate::fetcher::{FetchErrorKind, FetchOutcome, FetchStatus};

/// One entry that ended in [`FetchStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub path: String,
    pub kind: FetchErrorKind,
    pub reason: String,
}

/// End-of-run report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    pub completed: usize,
    pub skipped_existing: usize,
    pub skipped_not_raw: usize,
    pub skipped_has_raw: usize,
    pub failed: usize,
    /// Entries never dispatched because the run was cancelled.
    pub not_started: usize,
    pub bytes_transferred: u64,
    /// Entries whose last connection went over IPv4 / IPv6.
    pub ipv4_entries: usize,
    pub ipv6_entries: usize,
    pub elapsed: Duration,
    /// In completion order.
    pub failed_entries: Vec<FailedEntry>,
}

impl DownloadSummary {
    pub fn count(&self, status: FetchStatus) -> usize {
        match status {
            FetchStatus::Completed => self.completed,
            FetchStatus::SkippedExisting => self.skipped_existing,
            FetchStatus::SkippedNotRaw => self.skipped_not_raw,
            FetchStatus::SkippedHasRaw => self.skipped_has_raw,
            FetchStatus::Failed => self.failed,
        }
    }

    /// Entries that produced an outcome.
    pub fn finished(&self) -> usize {
        self.completed + self.skipped_existing + self.skipped_not_raw + self.skipped_has_raw + self.failed
    }

    /// True when every entry was fetched or legitimately skipped.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.not_started == 0
    }
}

/// Running aggregate fed one outcome at a time by the scheduler's collector.
#[derive(Debug, Default)]
pub struct StatsCollector {
    summary: DownloadSummary,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: FetchOutcome) {
        let s = &mut self.summary;
        s.bytes_transferred += outcome.bytes_transferred;
        match outcome.address_family {
            AddressFamily::Ipv4 => s.ipv4_entries += 1,
            AddressFamily::Ipv6 => s.ipv6_entries += 1,
            AddressFamily::Unknown => {}
        }
        match outcome.status {
            FetchStatus::Completed => s.completed += 1,
            FetchStatus::SkippedExisting => s.skipped_existing += 1,
            FetchStatus::SkippedNotRaw => s.skipped_not_raw += 1,
            FetchStatus::SkippedHasRaw => s.skipped_has_raw += 1,
            FetchStatus::Failed => {
                s.failed += 1;
                let (kind, reason) = match outcome.error {
                    Some(e) => (e.kind(), e.to_string()),
                    None => (FetchErrorKind::ConnectionFailed, "unknown error".to_string()),
                };
                s.failed_entries.push(FailedEntry {
                    path: outcome.path,
                    kind,
                    reason,
                });
            }
        }
    }

    /// Outcomes recorded so far.
    pub fn finished(&self) -> usize {
        self.summary.finished()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.summary.bytes_transferred
    }

    pub fn finish(mut self, not_started: usize, elapsed: Duration) -> DownloadSummary {
        self.summary.not_started = not_started;
        self.summary.elapsed = elapsed;
        self.summary
    }
}
