//! Allow/ignore glob rules for repository file paths.
//!
//! Patterns are case-sensitive and `/` is never matched by a wildcard. A
//! pattern that contains no `/` is tested against the basename only, so
//! `*.bin` selects `weights/model.bin` while `weights/*.bin` selects only
//! direct children of `weights/`. Ignore rules always win over allow rules.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// A glob pattern that failed to compile.
#[derive(Debug, thiserror::Error)]
#[error("invalid pattern {pattern:?}: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: globset::Error,
}

/// Compiled pattern list, split by whether a rule targets the full path or the basename.
#[derive(Debug, Clone)]
struct RuleSet {
    full_path: GlobSet,
    basename: GlobSet,
    len: usize,
}

impl RuleSet {
    fn compile(patterns: &[String]) -> Result<Option<Self>, PatternError> {
        let patterns: Vec<&str> = patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut full_path = GlobSetBuilder::new();
        let mut basename = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map_err(|source| PatternError {
                    pattern: pattern.to_string(),
                    source,
                })?;
            if pattern.contains('/') {
                full_path.add(glob);
            } else {
                basename.add(glob);
            }
        }
        let build = |builder: GlobSetBuilder| {
            builder.build().map_err(|source| PatternError {
                pattern: patterns.join(","),
                source,
            })
        };
        Ok(Some(Self {
            full_path: build(full_path)?,
            basename: build(basename)?,
            len: patterns.len(),
        }))
    }

    fn is_match(&self, path: &str) -> bool {
        if self.full_path.is_match(path) {
            return true;
        }
        let name = path.rsplit('/').next().unwrap_or(path);
        self.basename.is_match(Path::new(name))
    }
}

/// Evaluates repository paths against ordered allow/ignore rules.
///
/// Pure and deterministic; the plan builder and dry-run previews share it.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    allow: Option<RuleSet>,
    ignore: Option<RuleSet>,
}

impl PatternMatcher {
    /// Compile allow and ignore lists. Blank entries are skipped.
    pub fn new(allow: &[String], ignore: &[String]) -> Result<Self, PatternError> {
        Ok(Self {
            allow: RuleSet::compile(allow)?,
            ignore: RuleSet::compile(ignore)?,
        })
    }

    /// True if `path` passes the rules: it matches an allow rule (or there are
    /// none) and matches no ignore rule.
    pub fn is_match(&self, path: &str) -> bool {
        if self.ignore.as_ref().is_some_and(|ignore| ignore.is_match(path)) {
            return false;
        }
        match &self.allow {
            Some(allow) => allow.is_match(path),
            None => true,
        }
    }

    pub fn allow_count(&self) -> usize {
        self.allow.as_ref().map_or(0, |r| r.len)
    }

    pub fn ignore_count(&self) -> usize {
        self.ignore.as_ref().map_or(0, |r| r.len)
    }
}

/// One-shot form of [`PatternMatcher::is_match`].
pub fn matches(path: &str, allow: &[String], ignore: &[String]) -> Result<bool, PatternError> {
    Ok(PatternMatcher::new(allow, ignore)?.is_match(path))
}
