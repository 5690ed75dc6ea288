//! Download plans: the immutable artifact that separates listing from fetching.
//!
//! A plan is produced once by [`PlanBuilder`] from a registry listing, written
//! to disk as JSON by [`write_plan`], and later loaded (and fully re-validated)
//! by [`read_plan`] before any file is fetched.

mod builder;
mod codec;
mod error;
mod validate;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use builder::PlanBuilder;
pub use codec::{read_plan, write_plan};
pub use error::{PlanError, PlanFileError};
pub use validate::{check_relative_path, split_repo_id, validate_plan};

/// Kind of repository hosted on the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    Model,
    Dataset,
}

impl RepoType {
    pub fn as_str(self) -> &'static str {
        match self {
            RepoType::Model => "model",
            RepoType::Dataset => "dataset",
        }
    }

    /// Path segment used by the registry's URLs (`models` / `datasets`).
    pub fn url_segment(self) -> &'static str {
        match self {
            RepoType::Model => "models",
            RepoType::Dataset => "datasets",
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(RepoType::Model),
            "dataset" => Ok(RepoType::Dataset),
            other => Err(format!("unknown repo type {other:?} (expected model or dataset)")),
        }
    }
}

/// One file of the repository and where to fetch it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Repository-relative path, also the destination suffix under the local root.
    pub path: String,
    /// Expected byte length, when the registry reports it.
    #[serde(default)]
    pub size: Option<u64>,
    /// Primary fetch URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Direct URL reachable over IPv6 without redirects, for a subset of files.
    #[serde(default)]
    pub raw_url: Option<String>,
}

impl FileEntry {
    /// Destination for this entry below `root`. The path must already have
    /// passed [`check_relative_path`].
    pub fn local_path(&self, root: &Path) -> PathBuf {
        self.path
            .split('/')
            .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
    }
}

/// Immutable description of which files to fetch and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadPlan {
    /// `owner/name`.
    pub repo_id: String,
    pub repo_type: RepoType,
    /// Entries in registry listing order.
    #[serde(rename = "files")]
    pub entries: Vec<FileEntry>,
}

impl DownloadPlan {
    /// Sum of all known sizes.
    pub fn known_bytes(&self) -> u64 {
        self.entries.iter().filter_map(|e| e.size).sum()
    }

    /// Number of entries whose size the registry did not report.
    pub fn unknown_size_count(&self) -> usize {
        self.entries.iter().filter(|e| e.size.is_none()).count()
    }
}

/// Default plan filename: `{repo_type}__{owner}__{name}.json`.
pub fn default_plan_filename(repo_type: RepoType, repo_id: &str) -> String {
    format!("{}__{}.json", repo_type.as_str(), repo_id.replace('/', "__"))
}
