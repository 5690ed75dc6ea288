//! Plan/execute downloader for registry repositories on dual-stack networks.
//!
//! Stage one lists a repository and writes an immutable [`plan::DownloadPlan`];
//! stage two, possibly in a later process, validates that plan and fetches its
//! entries concurrently with resume.

pub mod address;
pub mod config;
pub mod control;
pub mod fetcher;
pub mod logging;
pub mod pattern;
pub mod plan;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod storage;
