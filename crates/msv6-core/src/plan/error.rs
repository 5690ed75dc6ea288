//! Planning and plan-file errors.

use std::path::PathBuf;

use super::RepoType;
use crate::pattern::PatternError;

/// Failure while building a plan. No plan file is written when one occurs.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("repository {repo_id} ({repo_type}) not found")]
    RepositoryNotFound { repo_id: String, repo_type: RepoType },

    #[error("registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },

    #[error("invalid repository id {0:?} (expected owner/name)")]
    InvalidRepoId(String),

    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

/// Failure reading or writing a plan file.
#[derive(Debug, thiserror::Error)]
pub enum PlanFileError {
    #[error("plan file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed plan {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl PlanFileError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        PlanFileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &std::path::Path, reason: impl Into<String>) -> Self {
        PlanFileError::Malformed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
