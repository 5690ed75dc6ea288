//! CLI command handlers. Each command is in its own file.

mod completions;
mod download;
mod plan;

pub use completions::{run_completions, run_man};
#[cfg(test)]
pub(crate) use download::exit_code as download_exit_code;
pub use download::run_download;
pub use plan::run_plan;

pub const EXIT_OK: i32 = 0;
/// The download finished but at least one entry failed.
pub const EXIT_FAILED_ENTRIES: i32 = 2;
/// Interrupted by Ctrl-C (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// `1536` → `1.5 KiB`.
pub(crate) fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
