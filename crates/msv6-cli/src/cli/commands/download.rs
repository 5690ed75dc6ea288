//! `msv6 download` – execute a plan.

use anyhow::{Context, Result};
use msv6_core::address::{ipv6_route_available, AddressPolicy};
use msv6_core::config::Msv6Config;
use msv6_core::control::CancelToken;
use msv6_core::fetcher::FetchOptions;
use msv6_core::plan::read_plan;
use msv6_core::scheduler::{run_plan, RunProgress};
use msv6_core::stats::DownloadSummary;
use std::time::{Duration, Instant};

use super::{human_bytes, EXIT_FAILED_ENTRIES, EXIT_INTERRUPTED, EXIT_OK};
use crate::cli::DownloadArgs;

const PROGRESS_INTERVAL_MS: u64 = 500;

pub async fn run_download(cfg: &Msv6Config, args: DownloadArgs, ipv6: bool) -> Result<i32> {
    let plan = read_plan(&args.plan)?;
    let workers = args.workers.unwrap_or(cfg.workers).max(1);
    let options = FetchOptions {
        overwrite: args.overwrite,
        skip_existing: !args.no_skip_existing,
        only_raw: args.only_raw,
        only_no_raw: args.only_no_raw,
        timeout: Duration::from_secs(args.timeout.unwrap_or(cfg.timeout_secs).max(1)),
        address_policy: cfg.address_policy(ipv6),
        retry: cfg.retry_policy(),
    };
    tracing::debug!(?options, workers, plan = %args.plan.display(), "download options");
    if options.address_policy == AddressPolicy::PreferIpv6 && !ipv6_route_available() {
        tracing::warn!("IPv6 preferred but no IPv6 route found; entries will fall back to IPv4");
    }

    let cancel = CancelToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted; waiting for in-flight files to stop...");
            signal_cancel.cancel();
        }
    });

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<RunProgress>(16);
    let progress_handle = tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        while let Some(p) = progress_rx.recv().await {
            let due = last_print.map_or(true, |t| t.elapsed().as_millis() as u64 >= PROGRESS_INTERVAL_MS);
            if due || p.files_done == p.files_total {
                println!(
                    "  {}/{} files ({:.0}%)  {} received  {}/s",
                    p.files_done,
                    p.files_total,
                    p.fraction() * 100.0,
                    human_bytes(p.bytes_transferred),
                    human_bytes(p.bytes_per_sec() as u64)
                );
                last_print = Some(Instant::now());
            }
        }
    });

    let root = args.local_dir.clone();
    let run_cancel = cancel.clone();
    let summary = tokio::task::spawn_blocking(move || {
        run_plan(&plan, &root, options, workers, &run_cancel, Some(&progress_tx))
    })
    .await
    .context("download task panicked")?;

    let _ = progress_handle.await;
    signal_task.abort();

    print_summary(&summary);
    Ok(exit_code(&summary, cancel.is_cancelled()))
}

pub(crate) fn exit_code(summary: &DownloadSummary, interrupted: bool) -> i32 {
    if interrupted {
        EXIT_INTERRUPTED
    } else if summary.is_success() {
        EXIT_OK
    } else {
        EXIT_FAILED_ENTRIES
    }
}

fn print_summary(summary: &DownloadSummary) {
    println!(
        "Completed {}, skipped {} existing, failed {}",
        summary.completed, summary.skipped_existing, summary.failed
    );
    if summary.skipped_not_raw > 0 {
        println!("Skipped {} without raw URL", summary.skipped_not_raw);
    }
    if summary.skipped_has_raw > 0 {
        println!("Skipped {} with raw URL", summary.skipped_has_raw);
    }
    if summary.not_started > 0 {
        println!("Not started: {}", summary.not_started);
    }
    println!(
        "Received {} in {:.1}s (IPv6 entries: {}, IPv4 entries: {})",
        human_bytes(summary.bytes_transferred),
        summary.elapsed.as_secs_f64(),
        summary.ipv6_entries,
        summary.ipv4_entries
    );
    for failed in &summary.failed_entries {
        println!("  FAILED {} [{}]: {}", failed.path, failed.kind, failed.reason);
    }
}
