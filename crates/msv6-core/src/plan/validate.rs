//! Load-time validation of plans. A plan file is untrusted input.

use std::collections::HashSet;
use std::path::{Component, Path};

use super::{DownloadPlan, FileEntry};

/// Splits `owner/name`; `None` unless both halves are non-empty, contain no
/// further `/`, no whitespace and are not `.`/`..`.
pub fn split_repo_id(repo_id: &str) -> Option<(&str, &str)> {
    let (owner, name) = repo_id.split_once('/')?;
    let ok = |part: &str| {
        !part.is_empty()
            && part != "."
            && part != ".."
            && !part.contains('/')
            && !part.chars().any(|c| c.is_whitespace() || c.is_control())
    };
    (ok(owner) && ok(name)).then_some((owner, name))
}

/// Checks that a repository path is relative and cannot escape the destination root.
///
/// Rejects empty paths, absolute paths, backslashes, empty / `.` / `..`
/// segments and control characters.
pub fn check_relative_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty path".to_string());
    }
    if path.starts_with('/') {
        return Err(format!("absolute path {path:?}"));
    }
    if path.contains('\\') {
        return Err(format!("backslash in path {path:?}"));
    }
    if path.chars().any(|c| c.is_control()) {
        return Err(format!("control character in path {path:?}"));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(format!("empty segment in path {path:?}")),
            "." | ".." => return Err(format!("traversal segment in path {path:?}")),
            _ => {}
        }
    }
    // Platform view (e.g. `C:` prefixes on Windows).
    if !Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(format!("non-relative path {path:?}"));
    }
    Ok(())
}

fn check_url(field: &str, value: &str) -> Result<(), String> {
    let parsed = url::Url::parse(value).map_err(|e| format!("{field} {value:?}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{field} {value:?}: unsupported scheme {other}")),
    }
}

fn check_entry(entry: &FileEntry) -> Result<(), String> {
    check_relative_path(&entry.path)?;
    if entry.url.is_none() && entry.raw_url.is_none() {
        return Err(format!("entry {:?} has neither url nor raw_url", entry.path));
    }
    if let Some(u) = &entry.url {
        check_url("url", u)?;
    }
    if let Some(u) = &entry.raw_url {
        check_url("raw_url", u)?;
    }
    Ok(())
}

/// Validates repo id, per-entry path safety and URLs, and path uniqueness.
pub fn validate_plan(plan: &DownloadPlan) -> Result<(), String> {
    if split_repo_id(&plan.repo_id).is_none() {
        return Err(format!("invalid repo_id {:?}", plan.repo_id));
    }
    let mut seen = HashSet::with_capacity(plan.entries.len());
    for entry in &plan.entries {
        check_entry(entry)?;
        if !seen.insert(entry.path.as_str()) {
            return Err(format!("duplicate path {:?}", entry.path));
        }
    }
    Ok(())
}
