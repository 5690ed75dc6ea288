//! Integration tests: plan building through the HTTP registry client.

mod common;

use std::fs;
use std::time::Duration;

use common::file_server::FileServer;
use msv6_core::address::AddressPolicy;
use msv6_core::control::CancelToken;
use msv6_core::fetcher::FetchOptions;
use msv6_core::plan::{PlanBuilder, PlanError, RepoType};
use msv6_core::registry::{ModelScopeRegistry, RegistryUrls, RepoRef};
use msv6_core::retry::RetryPolicy;
use msv6_core::scheduler::run_plan;
use tempfile::tempdir;

const LISTING: &str = r#"{
    "Code": 200,
    "Success": true,
    "Data": {
        "Files": [
            {"Name": "config.json", "Path": "config.json", "Type": "blob", "Size": 13, "IsLFS": false},
            {"Name": "weights", "Path": "weights", "Type": "tree", "Size": 0},
            {"Name": "part-1.bin", "Path": "weights/part-1.bin", "Type": "blob", "Size": 2048, "IsLFS": true},
            {"Name": "README.md", "Path": "README.md", "Type": "blob", "Size": 5, "IsLFS": false}
        ],
        "TotalCount": 3
    }
}"#;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
    }
}

fn registry_server() -> FileServer {
    let weights: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
    FileServer::start(vec![
        ("/api/v1/models/owner/name/repo/files", LISTING.as_bytes().to_vec()),
        ("/models/owner/name/resolve/master/config.json", b"{\"a\": 1}\n    ".to_vec()),
        ("/models/owner/name/resolve/master/weights/part-1.bin", weights),
        ("/models/owner/name/resolve/master/README.md", b"hello".to_vec()),
        ("/api/v1/models/owner/name/repo", b"{\"a\": 1}\n    ".to_vec()),
        (
            "/api/v1/models/owner/bad/repo/files",
            br#"{"Code": 10010205, "Success": false, "Message": "model not exists"}"#.to_vec(),
        ),
    ])
}

#[test]
fn builds_filtered_plan_from_listing() {
    let server = registry_server();
    let registry = ModelScopeRegistry::new(server.base(), "master", AddressPolicy::Auto);

    let plan = PlanBuilder::new(&registry)
        .retry_policy(fast_retry())
        .build("owner/name", RepoType::Model, &[], &["*.md".to_string()])
        .unwrap();

    let paths: Vec<&str> = plan.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["config.json", "weights/part-1.bin"]);
    assert_eq!(plan.entries[0].size, Some(13));
    assert!(plan.entries[0].raw_url.is_some(), "non-LFS files get a raw URL");
    assert!(plan.entries[1].raw_url.is_none());
    assert_eq!(
        plan.entries[1].url.as_deref(),
        Some(format!("{}/models/owner/name/resolve/master/weights/part-1.bin", server.base()).as_str())
    );
    assert_eq!(server.requests_for("/api/v1/models/owner/name/repo/files").len(), 1);
}

/// Route target (path and query) of one listing page of `owner/paged`.
fn page_target(page_number: u32, page_size: u32) -> String {
    let repo = RepoRef {
        repo_id: "owner/paged".to_string(),
        repo_type: RepoType::Model,
    };
    let urls = RegistryUrls::new("http://registry.invalid", "master", &repo).unwrap();
    urls.listing_url(page_number, page_size)
        .trim_start_matches("http://registry.invalid")
        .to_string()
}

#[test]
fn directory_row_on_full_page_does_not_end_paging() {
    let page_1 = r#"{"Code": 200, "Success": true, "Data": {"Files": [
        {"Path": "sub", "Type": "tree", "Size": 0},
        {"Path": "sub/a.bin", "Type": "blob", "Size": 1, "IsLFS": true}
    ]}}"#;
    let page_2 = r#"{"Code": 200, "Success": true, "Data": {"Files": [
        {"Path": "b.bin", "Type": "blob", "Size": 1, "IsLFS": true},
        {"Path": "c.bin", "Type": "blob", "Size": 1, "IsLFS": true}
    ]}}"#;
    let page_3 = r#"{"Code": 200, "Success": true, "Data": {"Files": []}}"#;
    let server = FileServer::start(vec![
        (page_target(1, 2).as_str(), page_1.as_bytes().to_vec()),
        (page_target(2, 2).as_str(), page_2.as_bytes().to_vec()),
        (page_target(3, 2).as_str(), page_3.as_bytes().to_vec()),
    ]);
    let registry = ModelScopeRegistry::new(server.base(), "master", AddressPolicy::Auto);

    let plan = PlanBuilder::new(&registry)
        .retry_policy(fast_retry())
        .page_size(2)
        .build("owner/paged", RepoType::Model, &[], &[])
        .unwrap();

    let paths: Vec<&str> = plan.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["sub/a.bin", "b.bin", "c.bin"]);
    let listing_requests = server.requests_for("/api/v1/models/owner/paged/repo/files");
    assert_eq!(listing_requests.len(), 3);
    assert!(listing_requests[1].target.contains("PageNumber=2"));
}

#[test]
fn listed_plan_downloads() {
    let server = registry_server();
    let registry = ModelScopeRegistry::new(server.base(), "master", AddressPolicy::Auto);
    let plan = PlanBuilder::new(&registry)
        .retry_policy(fast_retry())
        .build("owner/name", RepoType::Model, &["*.json".to_string(), "weights/*".to_string()], &[])
        .unwrap();
    let dir = tempdir().unwrap();

    let summary = run_plan(&plan, dir.path(), FetchOptions::default(), 2, &CancelToken::new(), None);

    assert_eq!(summary.completed, 2, "{summary:?}");
    assert_eq!(fs::metadata(dir.path().join("weights/part-1.bin")).unwrap().len(), 2048);
    assert_eq!(fs::read(dir.path().join("config.json")).unwrap().len(), 13);
}

#[test]
fn unknown_repository_is_not_found() {
    let server = registry_server();
    let registry = ModelScopeRegistry::new(server.base(), "master", AddressPolicy::Auto);
    let builder = PlanBuilder::new(&registry).retry_policy(fast_retry());

    let http_404 = builder.build("owner/missing", RepoType::Model, &[], &[]).unwrap_err();
    assert!(matches!(http_404, PlanError::RepositoryNotFound { .. }), "{http_404}");

    let unsuccessful = builder.build("owner/bad", RepoType::Model, &[], &[]).unwrap_err();
    assert!(matches!(unsuccessful, PlanError::RepositoryNotFound { .. }), "{unsuccessful}");

    let wrong_type = builder.build("owner/name", RepoType::Dataset, &[], &[]).unwrap_err();
    assert!(matches!(wrong_type, PlanError::RepositoryNotFound { .. }), "{wrong_type}");
}

#[test]
fn unreachable_registry_is_unavailable() {
    let registry = ModelScopeRegistry::new("http://127.0.0.1:9", "master", AddressPolicy::Auto)
        .with_timeout(Duration::from_secs(2));
    let err = PlanBuilder::new(&registry)
        .retry_policy(fast_retry())
        .build("owner/name", RepoType::Model, &[], &[])
        .unwrap_err();
    assert!(matches!(err, PlanError::RegistryUnavailable { .. }), "{err}");
}
