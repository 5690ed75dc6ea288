//! Decode ModelScope listing responses.

use serde::Deserialize;

use super::modelscope::RegistryUrls;
use super::{ListingPage, RegistryError};
use crate::plan::FileEntry;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ListingData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListingData {
    #[serde(default)]
    files: Option<Vec<ListedFile>>,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedFile {
    path: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default, rename = "Type")]
    kind: Option<String>,
    #[serde(default, rename = "IsLFS")]
    is_lfs: Option<bool>,
}

/// Parses one listing body. Directory rows are dropped. Non-LFS files get a
/// raw URL served by the registry host itself.
pub(crate) fn parse_listing(body: &[u8], urls: &RegistryUrls) -> Result<ListingPage, RegistryError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| RegistryError::Decode(e.to_string()))?;

    if envelope.success == Some(false) {
        let message = envelope.message.unwrap_or_else(|| "request failed".to_string());
        return Err(RegistryError::NotFound(format!(
            "code {}: {}",
            envelope.code.unwrap_or_default(),
            message
        )));
    }

    let data = envelope
        .data
        .ok_or_else(|| RegistryError::Decode("missing Data".to_string()))?;

    let mut files = Vec::new();
    let mut directories = Vec::new();
    for listed in data.files.unwrap_or_default() {
        let path = listed.path.trim_start_matches('/').to_string();
        if listed.kind.as_deref() == Some("tree") {
            directories.push(path);
            continue;
        }
        let raw_url = if listed.is_lfs == Some(false) {
            Some(urls.raw_url(&path))
        } else {
            None
        };
        files.push(FileEntry {
            url: Some(urls.resolve_url(&path)),
            raw_url,
            size: listed.size,
            path,
        });
    }

    Ok(ListingPage {
        files,
        directories,
        total: data.total_count,
    })
}
