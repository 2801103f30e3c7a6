//! Source resolution use case - finds the best unused item for a category

use std::sync::Arc;

use crate::{
    model::{Category, ContentItem, FeedEntry},
    ports::{FeedProvider, VideoSearch},
    store::{Committed, UsedItemStore},
};

/// Configuration for the resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Keyword appended to topical video searches and used alone as the last fallback
    pub video_keyword: String,
    /// Results requested per video search
    pub video_result_limit: usize,
    /// Title markers that identify a podcast entry (lowercase)
    pub podcast_markers: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            video_keyword: "BJJ".to_string(),
            video_result_limit: 5,
            podcast_markers: vec!["podcast".to_string(), "episode".to_string()],
        }
    }
}

/// Tiered resolver over the configured providers
pub struct SourceResolver {
    feeds: Vec<Arc<dyn FeedProvider>>,
    video_feeds: Vec<Arc<dyn FeedProvider>>,
    video_search: Option<Arc<dyn VideoSearch>>,
    config: ResolverConfig,
}

impl SourceResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            feeds: vec![],
            video_feeds: vec![],
            video_search: None,
            config,
        }
    }

    /// Feeds searched for articles and podcasts, in priority order
    pub fn with_feeds(mut self, feeds: Vec<Arc<dyn FeedProvider>>) -> Self {
        self.feeds = feeds;
        self
    }

    /// Feeds searched for videos before the keyword search
    pub fn with_video_feeds(mut self, feeds: Vec<Arc<dyn FeedProvider>>) -> Self {
        self.video_feeds = feeds;
        self
    }

    pub fn with_video_search(mut self, search: Arc<dyn VideoSearch>) -> Self {
        self.video_search = Some(search);
        self
    }

    /// Find the first unused item for `category`, committing it before returning.
    ///
    /// Provider failures only skip that provider. A candidate another instance
    /// claimed meanwhile is skipped in favour of the next one. `None` means
    /// every tier is exhausted.
    pub async fn resolve(
        &self,
        category: Category,
        topic: &str,
        used: &UsedItemStore,
    ) -> Option<ContentItem> {
        let item = match category {
            Category::Article | Category::Podcast => {
                self.resolve_from_feeds(category, &self.feeds, topic, used)
                    .await
            }
            Category::Video => match self
                .resolve_from_feeds(category, &self.video_feeds, topic, used)
                .await
            {
                Some(item) => Some(item),
                None => self.resolve_from_search(topic, used).await,
            },
        };

        let Some(item) = item else {
            tracing::info!(category = %category, topic = %topic, "No unused content found");
            return None;
        };

        tracing::info!(
            category = %category,
            item_id = %item.id,
            title = %item.title,
            "Resolved content item"
        );

        Some(item)
    }

    async fn resolve_from_feeds(
        &self,
        category: Category,
        feeds: &[Arc<dyn FeedProvider>],
        topic: &str,
        used: &UsedItemStore,
    ) -> Option<ContentItem> {
        if feeds.is_empty() {
            return None;
        }

        // Each feed is fetched once and reused for both tiers.
        let snapshots = self.fetch_all(feeds).await;
        let topic = topic.to_lowercase();

        let topical = snapshots.iter().flatten().filter(|entry| {
            let title = entry.title.to_lowercase();
            title.contains(&topic) && self.matches_format(category, &title)
        });
        for entry in topical {
            if self.claim(&entry.id, used).await {
                tracing::debug!(item_id = %entry.id, "Tier 1 topical match");
                return Some(to_item(entry, category));
            }
        }

        let generic = snapshots
            .iter()
            .flatten()
            .filter(|entry| self.matches_format(category, &entry.title.to_lowercase()));
        for entry in generic {
            if self.claim(&entry.id, used).await {
                tracing::debug!(item_id = %entry.id, "Tier 2 generic match");
                return Some(to_item(entry, category));
            }
        }

        None
    }

    /// Commit `id` unless it is already used; true when the caller now owns it
    async fn claim(&self, id: &str, used: &UsedItemStore) -> bool {
        if used.contains(id) {
            return false;
        }

        match used.commit(id).await {
            Ok(Committed::New) => true,
            Ok(Committed::AlreadyUsed) => {
                tracing::debug!(item_id = %id, "Candidate already used, trying next");
                false
            }
            Err(error) => {
                tracing::error!(
                    item_id = %id,
                    error = %error,
                    "Failed to persist used item, continuing with in-memory record"
                );
                true
            }
        }
    }

    async fn fetch_all(&self, feeds: &[Arc<dyn FeedProvider>]) -> Vec<Vec<FeedEntry>> {
        let mut snapshots = Vec::with_capacity(feeds.len());
        for feed in feeds {
            match feed.entries().await {
                Ok(entries) => {
                    tracing::debug!(feed = %feed.name(), count = entries.len(), "Fetched feed");
                    snapshots.push(entries);
                }
                Err(error) => {
                    tracing::warn!(feed = %feed.name(), error = %error, "Skipping feed");
                }
            }
        }
        snapshots
    }

    async fn resolve_from_search(&self, topic: &str, used: &UsedItemStore) -> Option<ContentItem> {
        let search = self.video_search.as_ref()?;
        let keyword = self.config.video_keyword.trim();
        let mut queries = vec![format!("{} {}", topic.trim(), keyword).trim().to_string()];
        if !queries.contains(&keyword.to_string()) {
            queries.push(keyword.to_string());
        }

        for query in queries.iter().filter(|q| !q.is_empty()) {
            let hits = match search.search(query, self.config.video_result_limit).await {
                Ok(hits) => hits,
                Err(error) => {
                    tracing::warn!(query = %query, error = %error, "Video search failed");
                    continue;
                }
            };

            for hit in hits {
                if self.claim(&hit.url, used).await {
                    tracing::debug!(query = %query, item_id = %hit.url, "Video search match");
                    return Some(ContentItem {
                        id: hit.url,
                        title: hit.title,
                        category: Category::Video,
                    });
                }
            }
        }

        None
    }

    fn matches_format(&self, category: Category, title_lower: &str) -> bool {
        match category {
            Category::Podcast => self
                .config
                .podcast_markers
                .iter()
                .any(|marker| title_lower.contains(marker.as_str())),
            Category::Article | Category::Video => true,
        }
    }
}

fn to_item(entry: &FeedEntry, category: Category) -> ContentItem {
    ContentItem {
        id: entry.id.clone(),
        title: entry.title.clone(),
        category,
    }
}
