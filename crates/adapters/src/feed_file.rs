//! Feed provider backed by a JSON snapshot on disk
//!
//! The snapshot is an array of `{"link": ..., "title": ...}` objects in feed
//! order, refreshed by whatever process mirrors the upstream feed. It is read
//! again on every query so refreshes are picked up without a restart.

use async_trait::async_trait;
use bjj_bot_domain::{FeedEntry, FeedProvider, ProviderError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct SnapshotEntry {
    #[serde(alias = "link", alias = "url")]
    id: String,
    #[serde(default)]
    title: String,
}

/// JSON feed snapshot file
#[derive(Debug, Clone)]
pub struct JsonFeedFile {
    path: PathBuf,
    name: String,
}

impl JsonFeedFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        Self { path, name }
    }
}

#[async_trait]
impl FeedProvider for JsonFeedFile {
    async fn entries(&self) -> Result<Vec<FeedEntry>, ProviderError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ProviderError::Unavailable(format!("{}: {}", self.name, e)))?;

        let entries: Vec<SnapshotEntry> = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::Malformed(format!("{}: {}", self.name, e)))?;

        Ok(entries
            .into_iter()
            .map(|entry| FeedEntry {
                id: entry.id.trim().to_string(),
                title: entry.title.trim().to_string(),
            })
            .filter(|entry| !entry.id.is_empty())
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
