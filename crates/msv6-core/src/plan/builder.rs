//! Build a plan from the registry's paginated file listing.

use std::collections::HashSet;

use super::error::PlanError;
use super::validate::{check_relative_path, split_repo_id};
use super::{DownloadPlan, FileEntry, RepoType};
use crate::pattern::PatternMatcher;
use crate::registry::{Registry, RegistryError, RepoRef};
use crate::retry::{run_with_retry, RetryPolicy};

/// Upper bound on listing pages, so a registry that ignores paging cannot loop forever.
const MAX_PAGES: u32 = 10_000;

/// Aggregates every listing page of a repository and filters it into a plan.
pub struct PlanBuilder<'a, R: Registry + ?Sized> {
    registry: &'a R,
    retry: RetryPolicy,
    page_size: u32,
}

impl<'a, R: Registry + ?Sized> PlanBuilder<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            retry: RetryPolicy::default(),
            page_size: 100,
        }
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Lists the repository and keeps the files accepted by the allow/ignore rules.
    pub fn build(
        &self,
        repo_id: &str,
        repo_type: RepoType,
        allow: &[String],
        ignore: &[String],
    ) -> Result<DownloadPlan, PlanError> {
        let matcher = PatternMatcher::new(allow, ignore)?;
        self.build_with_matcher(repo_id, repo_type, &matcher)
    }

    pub fn build_with_matcher(
        &self,
        repo_id: &str,
        repo_type: RepoType,
        matcher: &PatternMatcher,
    ) -> Result<DownloadPlan, PlanError> {
        if split_repo_id(repo_id).is_none() {
            return Err(PlanError::InvalidRepoId(repo_id.to_string()));
        }
        let repo = RepoRef {
            repo_id: repo_id.to_string(),
            repo_type,
        };

        let listed = self.list_all(&repo)?;
        let total = listed.len();
        let entries: Vec<FileEntry> = listed
            .into_iter()
            .filter(|entry| matcher.is_match(&entry.path))
            .collect();

        tracing::info!(
            repo_id,
            %repo_type,
            listed = total,
            selected = entries.len(),
            allow = matcher.allow_count(),
            ignore = matcher.ignore_count(),
            "plan built"
        );
        Ok(DownloadPlan {
            repo_id: repo_id.to_string(),
            repo_type,
            entries,
        })
    }

    /// Fetches pages until the listing is exhausted. Duplicate paths keep their
    /// first occurrence; entries with unusable paths or no URL are dropped.
    ///
    /// Paging decisions use every row the registry returned, directories and
    /// dropped entries included.
    fn list_all(&self, repo: &RepoRef) -> Result<Vec<FileEntry>, PlanError> {
        let mut rows_seen: HashSet<String> = HashSet::new();
        let mut files_listed = 0u64;
        let mut kept: HashSet<String> = HashSet::new();
        let mut entries = Vec::new();

        for page_number in 1..=MAX_PAGES {
            let page = run_with_retry(&self.retry, None, |_| {
                self.registry.list_page(repo, page_number, self.page_size)
            })
            .map_err(|e| into_plan_error(e, repo))?;

            let received = page.files.len() + page.directories.len();
            let mut fresh = 0usize;
            for dir in page.directories {
                if rows_seen.insert(format!("{dir}/")) {
                    fresh += 1;
                }
            }
            for entry in page.files {
                if rows_seen.insert(entry.path.clone()) {
                    fresh += 1;
                    files_listed += 1;
                }
                if let Err(reason) = check_relative_path(&entry.path) {
                    tracing::warn!(%reason, "skipping listed file with unusable path");
                    continue;
                }
                if entry.url.is_none() && entry.raw_url.is_none() {
                    tracing::warn!(path = %entry.path, "skipping listed file without URL");
                    continue;
                }
                if kept.insert(entry.path.clone()) {
                    entries.push(entry);
                }
            }
            tracing::debug!(page_number, received, fresh, kept = entries.len(), "listing page");

            let reached_total = page.total.is_some_and(|t| files_listed >= t);
            if received < self.page_size as usize || fresh == 0 || reached_total {
                break;
            }
        }
        Ok(entries)
    }
}

fn into_plan_error(e: RegistryError, repo: &RepoRef) -> PlanError {
    match e {
        RegistryError::NotFound(reason) => {
            tracing::debug!(%reason, "registry reported repository missing");
            PlanError::RepositoryNotFound {
                repo_id: repo.repo_id.clone(),
                repo_type: repo.repo_type,
            }
        }
        other => PlanError::RegistryUnavailable {
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ListingPage;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Serves scripted pages; records the page numbers requested.
    struct ScriptedRegistry {
        pages: RefCell<VecDeque<Result<ListingPage, RegistryError>>>,
        calls: Cell<u32>,
    }

    impl ScriptedRegistry {
        fn new(pages: Vec<Result<ListingPage, RegistryError>>) -> Self {
            Self {
                pages: RefCell::new(pages.into()),
                calls: Cell::new(0),
            }
        }
    }

    impl Registry for ScriptedRegistry {
        fn list_page(&self, _repo: &RepoRef, _page: u32, _size: u32) -> Result<ListingPage, RegistryError> {
            self.calls.set(self.calls.get() + 1);
            self.pages.borrow_mut().pop_front().unwrap_or_else(|| {
                Ok(ListingPage::default())
            })
        }
    }

    fn file(path: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            size: Some(10),
            url: Some(format!("https://example.com/{path}")),
            raw_url: None,
        }
    }

    fn page(paths: &[&str]) -> Result<ListingPage, RegistryError> {
        Ok(ListingPage {
            files: paths.iter().map(|p| file(p)).collect(),
            ..ListingPage::default()
        })
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        }
    }

    fn paths(plan: &DownloadPlan) -> Vec<&str> {
        plan.entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn aggregates_pages_before_filtering() {
        let reg = ScriptedRegistry::new(vec![page(&["a.bin", "b.txt"]), page(&["c.bin"])]);
        let plan = PlanBuilder::new(&reg)
            .page_size(2)
            .build("o/n", RepoType::Model, &["*.bin".to_string()], &[])
            .unwrap();
        assert_eq!(paths(&plan), ["a.bin", "c.bin"]);
        assert_eq!(reg.calls.get(), 2);
    }

    #[test]
    fn repeated_page_stops_paging_and_dedupes() {
        let reg = ScriptedRegistry::new(vec![page(&["a", "b"]), page(&["a", "b"]), page(&["z"])]);
        let plan = PlanBuilder::new(&reg)
            .page_size(2)
            .build("o/n", RepoType::Dataset, &[], &[])
            .unwrap();
        assert_eq!(paths(&plan), ["a", "b"]);
        assert_eq!(reg.calls.get(), 2);
    }

    #[test]
    fn total_count_ends_paging() {
        let reg = ScriptedRegistry::new(vec![Ok(ListingPage {
            files: vec![file("a"), file("b")],
            total: Some(2),
            ..ListingPage::default()
        })]);
        let plan = PlanBuilder::new(&reg).page_size(2).build("o/n", RepoType::Model, &[], &[]).unwrap();
        assert_eq!(plan.entries.len(), 2);
        assert_eq!(reg.calls.get(), 1);
    }

    #[test]
    fn directory_rows_count_towards_full_page() {
        let reg = ScriptedRegistry::new(vec![
            Ok(ListingPage {
                files: vec![file("sub/a.bin")],
                directories: vec!["sub".to_string()],
                total: None,
            }),
            page(&["b.bin", "c.bin"]),
        ]);
        let plan = PlanBuilder::new(&reg).page_size(2).build("o/n", RepoType::Model, &[], &[]).unwrap();
        assert_eq!(paths(&plan), ["sub/a.bin", "b.bin", "c.bin"]);
        assert_eq!(reg.calls.get(), 3);
    }

    #[test]
    fn page_of_dropped_rows_does_not_end_listing() {
        let mut no_url = file("no-url.bin");
        no_url.url = None;
        let reg = ScriptedRegistry::new(vec![
            Ok(ListingPage {
                files: vec![file("../evil"), no_url],
                ..ListingPage::default()
            }),
            page(&["ok.bin"]),
        ]);
        let plan = PlanBuilder::new(&reg).page_size(2).build("o/n", RepoType::Model, &[], &[]).unwrap();
        assert_eq!(paths(&plan), ["ok.bin"]);
        assert_eq!(reg.calls.get(), 2);
    }

    #[test]
    fn unsafe_listing_paths_are_dropped() {
        let reg = ScriptedRegistry::new(vec![page(&["ok.bin", "../evil", "/abs"])]);
        let plan = PlanBuilder::new(&reg).build("o/n", RepoType::Model, &[], &[]).unwrap();
        assert_eq!(paths(&plan), ["ok.bin"]);
    }

    #[test]
    fn not_found_maps_to_repository_not_found() {
        let reg = ScriptedRegistry::new(vec![Err(RegistryError::NotFound("HTTP 404".into()))]);
        let err = PlanBuilder::new(&reg)
            .retry_policy(fast_retry())
            .build("o/missing", RepoType::Model, &[], &[])
            .unwrap_err();
        assert!(matches!(err, PlanError::RepositoryNotFound { ref repo_id, .. } if repo_id == "o/missing"));
        assert_eq!(reg.calls.get(), 1, "not-found is not retried");
    }

    #[test]
    fn transient_failures_are_retried_then_surface_as_unavailable() {
        let reg = ScriptedRegistry::new(vec![
            Err(RegistryError::Http(502)),
            Err(RegistryError::Http(502)),
            Err(RegistryError::Http(502)),
        ]);
        let err = PlanBuilder::new(&reg)
            .retry_policy(fast_retry())
            .build("o/n", RepoType::Model, &[], &[])
            .unwrap_err();
        assert!(matches!(err, PlanError::RegistryUnavailable { .. }));
        assert_eq!(reg.calls.get(), 3);
    }

    #[test]
    fn transient_failure_then_success() {
        let reg = ScriptedRegistry::new(vec![Err(RegistryError::Http(503)), page(&["a"])]);
        let plan = PlanBuilder::new(&reg)
            .retry_policy(fast_retry())
            .build("o/n", RepoType::Model, &[], &[])
            .unwrap();
        assert_eq!(paths(&plan), ["a"]);
    }

    #[test]
    fn invalid_inputs_rejected_before_listing() {
        let reg = ScriptedRegistry::new(vec![]);
        let builder = PlanBuilder::new(&reg);
        assert!(matches!(
            builder.build("no-slash", RepoType::Model, &[], &[]),
            Err(PlanError::InvalidRepoId(_))
        ));
        assert!(matches!(
            builder.build("o/n", RepoType::Model, &["[".to_string()], &[]),
            Err(PlanError::InvalidPattern(_))
        ));
        assert_eq!(reg.calls.get(), 0);
    }
}
