//! Bounded worker pool over a plan's entries.
//!
//! Workers pop entries in plan order from a shared queue and send each
//! outcome over a channel to a single collector, which owns the
//! [`StatsCollector`] and emits [`RunProgress`] snapshots. A failed entry never
//! stops the others; cancellation only stops dispatch of queued entries.

mod progress;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{mpsc, Mutex};
use std::time::Instant;

use crate::control::CancelToken;
use crate::fetcher::{EntryFetcher, FetchOptions, ResumableFetcher};
use crate::plan::{DownloadPlan, FileEntry};
use crate::stats::{DownloadSummary, StatsCollector};

pub use progress::RunProgress;

/// Default number of concurrent fetches.
pub const DEFAULT_WORKERS: usize = 4;

/// Runs a plan with at most `workers` fetches in flight.
#[derive(Debug, Clone, Copy)]
pub struct DownloadScheduler {
    workers: usize,
}

impl Default for DownloadScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl DownloadScheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetches every entry of `plan` below `root` and returns the summary.
    ///
    /// Blocks until all dispatched entries finished. Progress snapshots are
    /// best-effort: a full channel drops the snapshot.
    pub fn run<F>(
        &self,
        plan: &DownloadPlan,
        root: &Path,
        fetcher: &F,
        cancel: &CancelToken,
        progress_tx: Option<&tokio::sync::mpsc::Sender<RunProgress>>,
    ) -> DownloadSummary
    where
        F: EntryFetcher + ?Sized,
    {
        let started = Instant::now();
        let total = plan.entries.len();
        let known_total_bytes = plan.known_bytes();
        let queue: Mutex<VecDeque<&FileEntry>> = Mutex::new(plan.entries.iter().collect());
        let num_workers = self.workers.min(total);
        tracing::info!(
            repo_id = %plan.repo_id,
            entries = total,
            workers = num_workers,
            root = %root.display(),
            "download started"
        );

        let mut stats = StatsCollector::new();
        std::thread::scope(|scope| {
            let (tx, rx) = mpsc::channel();
            for worker in 0..num_workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = match queue.lock() {
                        Ok(mut q) => q.pop_front(),
                        Err(_) => None,
                    };
                    let Some(entry) = next else {
                        break;
                    };
                    tracing::debug!(worker, path = %entry.path, "dispatch");
                    if tx.send(fetcher.fetch(entry, root, cancel)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for outcome in rx {
                stats.record(outcome);
                if let Some(progress_tx) = progress_tx {
                    let _ = progress_tx.try_send(RunProgress {
                        files_done: stats.finished(),
                        files_total: total,
                        bytes_transferred: stats.bytes_transferred(),
                        known_total_bytes,
                        elapsed: started.elapsed(),
                    });
                }
            }
        });

        let not_started = total - stats.finished();
        let summary = stats.finish(not_started, started.elapsed());
        if not_started > 0 {
            tracing::warn!(not_started, "run cancelled before all entries were dispatched");
        }
        tracing::info!(
            completed = summary.completed,
            skipped_existing = summary.skipped_existing,
            failed = summary.failed,
            bytes = summary.bytes_transferred,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "download finished"
        );
        summary
    }
}

/// Library entry point: fetch `plan` below `root` with [`ResumableFetcher`].
pub fn run_plan(
    plan: &DownloadPlan,
    root: &Path,
    options: FetchOptions,
    workers: usize,
    cancel: &CancelToken,
    progress_tx: Option<&tokio::sync::mpsc::Sender<RunProgress>>,
) -> DownloadSummary {
    let fetcher = ResumableFetcher::new(options);
    DownloadScheduler::new(workers).run(plan, root, &fetcher, cancel, progress_tx)
}
