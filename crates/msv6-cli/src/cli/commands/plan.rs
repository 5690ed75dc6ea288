//! `msv6 plan` – list a repository and write a download plan.

use anyhow::{Context, Result};
use msv6_core::config::Msv6Config;
use msv6_core::pattern::PatternMatcher;
use msv6_core::plan::{default_plan_filename, write_plan, DownloadPlan, PlanBuilder};
use msv6_core::registry::ModelScopeRegistry;
use std::path::PathBuf;
use std::time::Duration;

use super::{human_bytes, EXIT_OK};
use crate::cli::PlanArgs;

pub async fn run_plan(cfg: &Msv6Config, args: PlanArgs, ipv6: bool) -> Result<i32> {
    // Invalid globs are reported before any network call.
    let matcher = PatternMatcher::new(&args.allow_patterns, &args.ignore_patterns)?;

    let endpoint = args.endpoint.clone().unwrap_or_else(|| cfg.endpoint.clone());
    let revision = args.revision.clone().unwrap_or_else(|| cfg.revision.clone());
    let registry = ModelScopeRegistry::new(&endpoint, &revision, cfg.address_policy(ipv6))
        .with_timeout(Duration::from_secs(cfg.timeout_secs.max(1)));
    let retry = cfg.retry_policy();
    let page_size = cfg.page_size;
    let repo_id = args.repo_id.clone();
    let repo_type = args.repo_type;

    tracing::info!(%repo_id, %repo_type, %endpoint, %revision, "planning");
    let plan = tokio::task::spawn_blocking(move || {
        PlanBuilder::new(&registry)
            .retry_policy(retry)
            .page_size(page_size)
            .build_with_matcher(&repo_id, repo_type, &matcher)
    })
    .await
    .context("plan task panicked")??;

    if args.dry_run {
        print_entries(&plan);
        return Ok(EXIT_OK);
    }

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(default_plan_filename(plan.repo_type, &plan.repo_id)));
    write_plan(&plan, &output)?;
    println!(
        "Wrote plan with {} file(s), {}{} to {}",
        plan.entries.len(),
        human_bytes(plan.known_bytes()),
        unknown_suffix(&plan),
        output.display()
    );
    Ok(EXIT_OK)
}

fn print_entries(plan: &DownloadPlan) {
    for entry in &plan.entries {
        let size = entry.size.map(human_bytes).unwrap_or_else(|| "?".to_string());
        let raw = if entry.raw_url.is_some() { "  [raw]" } else { "" };
        println!("{:>10}  {}{}", size, entry.path, raw);
    }
    println!(
        "{} file(s), {}{} (dry run, nothing written)",
        plan.entries.len(),
        human_bytes(plan.known_bytes()),
        unknown_suffix(plan)
    );
}

fn unknown_suffix(plan: &DownloadPlan) -> String {
    match plan.unknown_size_count() {
        0 => String::new(),
        n => format!(" + {n} of unknown size"),
    }
}
