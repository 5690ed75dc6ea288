//! Progress snapshots for a download run.
//!
//! Sent by the scheduler's collector after every finished entry; the CLI
//! prints them. Rate is computed from bytes received over the network.

use std::time::Duration;

/// Snapshot of a run (CLI-friendly).
#[derive(Debug, Clone, PartialEq)]
pub struct RunProgress {
    /// Entries that produced an outcome so far.
    pub files_done: usize,
    pub files_total: usize,
    /// Body bytes received so far.
    pub bytes_transferred: u64,
    /// Sum of the plan's known sizes.
    pub known_total_bytes: u64,
    pub elapsed: Duration,
}

impl RunProgress {
    /// Bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes_transferred as f64 / secs
    }

    /// Fraction of entries finished in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.files_total == 0 {
            return 1.0;
        }
        (self.files_done as f64 / self.files_total as f64).min(1.0)
    }
}
