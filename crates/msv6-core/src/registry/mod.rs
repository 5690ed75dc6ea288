//! Registry listing capability consumed by the plan builder.
//!
//! The builder only sees [`Registry::list_page`]; [`ModelScopeRegistry`] is
//! the HTTP implementation, tests substitute scripted registries.

mod modelscope;
mod parse;

use crate::plan::{FileEntry, RepoType};
use crate::retry::{classify_curl_error, classify_http_status, ErrorKind, Retryable};

pub use modelscope::{ModelScopeRegistry, RegistryUrls};

/// Repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub repo_id: String,
    pub repo_type: RepoType,
}

/// One page of the repository file listing.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub files: Vec<FileEntry>,
    /// Paths of directory rows on this page; they count towards the page size.
    pub directories: Vec<String>,
    /// Total number of files, when the registry reports it.
    pub total: Option<u64>,
}

/// Failure of a single listing call.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry says the repository (or repository type) does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport: {0}")]
    Transport(#[from] curl::Error),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl Retryable for RegistryError {
    fn retry_kind(&self) -> ErrorKind {
        match self {
            RegistryError::Transport(e) => classify_curl_error(e),
            RegistryError::Http(code) => classify_http_status(*code),
            RegistryError::NotFound(_) | RegistryError::Decode(_) => ErrorKind::Other,
        }
    }
}

/// "List repository files" capability. Pages are 1-based.
pub trait Registry {
    fn list_page(&self, repo: &RepoRef, page_number: u32, page_size: u32) -> Result<ListingPage, RegistryError>;
}
