//! ModelScope listing client over libcurl.

use std::time::Duration;
use url::Url;

use super::parse::parse_listing;
use super::{ListingPage, Registry, RegistryError, RepoRef};
use crate::address::{AddressFamilySelector, AddressPolicy};
use crate::plan::{split_repo_id, RepoType};

/// URL scheme of one repository on a ModelScope-compatible registry.
#[derive(Debug, Clone)]
pub struct RegistryUrls {
    endpoint: Url,
    revision: String,
    kind: &'static str,
    owner: String,
    name: String,
}

impl RegistryUrls {
    pub fn new(endpoint: &str, revision: &str, repo: &RepoRef) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        let (owner, name) = split_repo_id(&repo.repo_id).unwrap_or((repo.repo_id.as_str(), ""));
        Ok(Self {
            endpoint,
            revision: revision.to_string(),
            kind: repo.repo_type.url_segment(),
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    fn with_segments<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Listing page URL. Datasets use the tree endpoint, models the files endpoint.
    pub fn listing_url(&self, page_number: u32, page_size: u32) -> String {
        let leaf = if self.kind == RepoType::Dataset.url_segment() {
            "tree"
        } else {
            "files"
        };
        let mut url = self.with_segments([
            "api",
            "v1",
            self.kind,
            self.owner.as_str(),
            self.name.as_str(),
            "repo",
            leaf,
        ]);
        url.query_pairs_mut()
            .append_pair("Revision", &self.revision)
            .append_pair("Root", "/")
            .append_pair("Recursive", "true")
            .append_pair("PageNumber", &page_number.to_string())
            .append_pair("PageSize", &page_size.to_string());
        url.into()
    }

    /// Resolve URL; the registry usually redirects it to a CDN.
    pub fn resolve_url(&self, path: &str) -> String {
        let head = [self.kind, self.owner.as_str(), self.name.as_str(), "resolve", self.revision.as_str()];
        self.with_segments(head.into_iter().chain(path.split('/'))).into()
    }

    /// Direct file URL served by the registry host (no redirect).
    pub fn raw_url(&self, path: &str) -> String {
        let mut url = self.with_segments(["api", "v1", self.kind, self.owner.as_str(), self.name.as_str(), "repo"]);
        url.query_pairs_mut()
            .append_pair("Revision", &self.revision)
            .append_pair("FilePath", path);
        url.into()
    }
}

/// HTTP implementation of [`Registry`] for ModelScope-compatible hosts.
#[derive(Debug, Clone)]
pub struct ModelScopeRegistry {
    endpoint: String,
    revision: String,
    selector: AddressFamilySelector,
    timeout: Duration,
}

impl ModelScopeRegistry {
    pub fn new(endpoint: &str, revision: &str, policy: AddressPolicy) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            revision: revision.to_string(),
            selector: AddressFamilySelector::new(policy),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Registry for ModelScopeRegistry {
    fn list_page(&self, repo: &RepoRef, page_number: u32, page_size: u32) -> Result<ListingPage, RegistryError> {
        let urls = RegistryUrls::new(&self.endpoint, &self.revision, repo)
            .map_err(|e| RegistryError::Decode(format!("endpoint {}: {}", self.endpoint, e)))?;
        let url = urls.listing_url(page_number, page_size);

        let (result, peer) = self
            .selector
            .resolve_connection(false, |easy| get_body(easy, &url, self.timeout));
        let (code, body) = result?;
        tracing::debug!(%url, code, family = %peer.family, "listing request");

        match code {
            200..=299 => parse_listing(&body, &urls),
            401 | 403 | 404 => Err(RegistryError::NotFound(format!("HTTP {code}"))),
            other => Err(RegistryError::Http(other)),
        }
    }
}

/// GET `url`, returning status code and body.
fn get_body(easy: &mut curl::easy::Easy, url: &str, timeout: Duration) -> Result<(u32, Vec<u8>), RegistryError> {
    let mut body = Vec::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(timeout)?;
    easy.timeout(timeout.saturating_mul(4))?;
    easy.useragent(concat!("msv6/", env!("CARGO_PKG_VERSION")))?;
    let mut headers = curl::easy::List::new();
    headers.append("Accept: application/json")?;
    easy.http_headers(headers)?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let code = easy.response_code()?;
    Ok((code, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(repo_type: RepoType) -> RepoRef {
        RepoRef {
            repo_id: "owner/name".to_string(),
            repo_type,
        }
    }

    #[test]
    fn model_urls() {
        let urls = RegistryUrls::new("https://registry.example/", "master", &repo(RepoType::Model)).unwrap();
        let listing = urls.listing_url(2, 50);
        assert!(listing.starts_with("https://registry.example/api/v1/models/owner/name/repo/files?"));
        assert!(listing.contains("PageNumber=2"));
        assert!(listing.contains("PageSize=50"));
        assert!(listing.contains("Revision=master"));
        assert_eq!(
            urls.resolve_url("sub dir/w.bin"),
            "https://registry.example/models/owner/name/resolve/master/sub%20dir/w.bin"
        );
        assert_eq!(
            urls.raw_url("sub/w.bin"),
            "https://registry.example/api/v1/models/owner/name/repo?Revision=master&FilePath=sub%2Fw.bin"
        );
    }

    #[test]
    fn dataset_urls() {
        let urls = RegistryUrls::new("http://[::1]:8080", "v2", &repo(RepoType::Dataset)).unwrap();
        assert!(urls
            .listing_url(1, 100)
            .starts_with("http://[::1]:8080/api/v1/datasets/owner/name/repo/tree?"));
        assert_eq!(
            urls.resolve_url("a.csv"),
            "http://[::1]:8080/datasets/owner/name/resolve/v2/a.csv"
        );
    }

    #[test]
    fn bad_endpoint_rejected() {
        assert!(RegistryUrls::new("not a url", "master", &repo(RepoType::Model)).is_err());
        assert!(RegistryUrls::new("mailto:x@y", "master", &repo(RepoType::Model)).is_err());
    }
}
