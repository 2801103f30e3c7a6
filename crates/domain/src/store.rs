//! Used-item store
//!
//! Owns the set of identifiers that have already been published. Lookups hit an
//! in-memory set; commits are written to a local append-only log and, when a
//! remote document is configured, merged into it with optimistic concurrency.
//! The remote tier is best effort: when it is unreachable or keeps conflicting
//! the store carries on with local persistence and logs the degradation.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::ports::{RemoteDocument, RemoteDocumentError, UsedLog, UsedLogError};

/// Default number of read-merge-write attempts against the remote document
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Errors surfaced by the used-item store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Local used-item log error: {0}")]
    Local(#[from] UsedLogError),
}

/// Result of a successful [`UsedItemStore::commit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Committed {
    /// This call recorded the id; the caller owns the item
    New,
    /// The id was already used, here or by another instance
    AlreadyUsed,
}

enum RemoteClaim {
    Claimed,
    Taken,
    Skipped,
}

/// Persistence strategy behind the in-memory set
#[derive(Clone)]
pub enum Backing {
    /// Local append-only log only
    LocalOnly,
    /// Shared remote document, with the local log as cache and fallback
    Remote {
        document: Arc<dyn RemoteDocument>,
        max_attempts: u32,
    },
}

impl Backing {
    pub fn name(&self) -> &'static str {
        match self {
            Backing::LocalOnly => "local",
            Backing::Remote { .. } => "remote",
        }
    }
}

/// Durable set of previously published item identifiers
pub struct UsedItemStore {
    local: Arc<dyn UsedLog>,
    backing: Backing,
    used: RwLock<HashSet<String>>,
    commit_lock: Mutex<()>,
}

impl UsedItemStore {
    pub fn new(local: Arc<dyn UsedLog>, backing: Backing) -> Self {
        Self {
            local,
            backing,
            used: RwLock::new(HashSet::new()),
            commit_lock: Mutex::new(()),
        }
    }

    /// Store persisted only to the local log
    pub fn local_only(local: Arc<dyn UsedLog>) -> Self {
        Self::new(local, Backing::LocalOnly)
    }

    /// Store shared through a remote document, cached in the local log
    pub fn with_remote(
        local: Arc<dyn UsedLog>,
        document: Arc<dyn RemoteDocument>,
        max_attempts: u32,
    ) -> Self {
        Self::new(
            local,
            Backing::Remote {
                document,
                max_attempts,
            },
        )
    }

    /// Populate the in-memory set from every available tier
    pub async fn load(&self) -> Result<HashSet<String>, StoreError> {
        let mut loaded: HashSet<String> = normalize(self.local.read_all().await?);
        let local_count = loaded.len();

        if let Backing::Remote { document, .. } = &self.backing {
            match document.read().await {
                Ok(doc) => {
                    let remote = parse_ids(&doc.content);
                    tracing::info!(
                        remote_count = remote.len(),
                        version = ?doc.version,
                        "Loaded remote used-item document"
                    );
                    loaded.extend(remote);
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        "Remote used-item document unavailable, using local log only"
                    );
                }
            }
        }

        tracing::info!(
            backing = self.backing.name(),
            local_count,
            total = loaded.len(),
            "Loaded used items"
        );

        let mut used = self.used.write().unwrap_or_else(|e| e.into_inner());
        used.extend(loaded);
        Ok(used.clone())
    }

    /// True iff `id` has been committed
    pub fn contains(&self, id: &str) -> bool {
        self.used
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    /// Number of known identifiers
    pub fn len(&self) -> usize {
        self.used.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record `id` as used.
    ///
    /// Returns [`Committed::AlreadyUsed`] when the id was known before this
    /// call, either locally or because another instance already claimed it in
    /// the remote document. Callers must not publish the item in that case.
    pub async fn commit(&self, id: &str) -> Result<Committed, StoreError> {
        // Serializes overlapping commits so the same id is never written twice.
        let _guard = self.commit_lock.lock().await;

        if self.contains(id) {
            tracing::debug!(item_id = %id, "Item already committed");
            return Ok(Committed::AlreadyUsed);
        }

        let claim = match &self.backing {
            Backing::LocalOnly => RemoteClaim::Skipped,
            Backing::Remote {
                document,
                max_attempts,
            } => self.push_remote(document.as_ref(), id, *max_attempts).await,
        };

        self.absorb([id.to_string()]);
        let local_result = self.local.append(id).await;
        if let Err(error) = &local_result {
            tracing::error!(item_id = %id, error = %error, "Failed to append to local used-item log");
        }

        let committed = match claim {
            RemoteClaim::Taken => {
                tracing::info!(item_id = %id, "Item already used by another instance");
                Committed::AlreadyUsed
            }
            RemoteClaim::Claimed | RemoteClaim::Skipped => Committed::New,
        };

        local_result.map(|()| committed).map_err(StoreError::from)
    }

    /// Merge the in-memory set plus `id` into the remote document
    async fn push_remote(
        &self,
        document: &dyn RemoteDocument,
        id: &str,
        max_attempts: u32,
    ) -> RemoteClaim {
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let doc = match document.read().await {
                Ok(doc) => doc,
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        "Remote used-item document unreadable, keeping local copy only"
                    );
                    return RemoteClaim::Skipped;
                }
            };

            let remote = parse_ids(&doc.content);
            let taken = remote.contains(id);
            // Pick up ids other instances published meanwhile.
            self.absorb(remote);
            if taken {
                return RemoteClaim::Taken;
            }

            let mut merged = self.snapshot();
            merged.insert(id.to_string());

            match document
                .write(&encode_ids(&merged), doc.version.as_deref())
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        attempt,
                        total = merged.len(),
                        "Updated remote used-item document"
                    );
                    return RemoteClaim::Claimed;
                }
                Err(RemoteDocumentError::Conflict) => {
                    tracing::warn!(attempt, max_attempts, "Remote used-item document conflict, retrying");
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        "Remote used-item write failed, keeping local copy only"
                    );
                    return RemoteClaim::Skipped;
                }
            }
        }

        tracing::warn!(
            max_attempts,
            "Remote used-item document kept conflicting, keeping local copy only"
        );
        RemoteClaim::Skipped
    }

    fn absorb(&self, ids: impl IntoIterator<Item = String>) {
        let mut used = self.used.write().unwrap_or_else(|e| e.into_inner());
        used.extend(ids);
    }

    fn snapshot(&self) -> HashSet<String> {
        self.used.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Parse a newline-delimited identifier list; duplicates collapse
pub fn parse_ids(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Encode identifiers as a sorted newline-delimited list
pub fn encode_ids(ids: &HashSet<String>) -> String {
    let sorted: BTreeSet<&String> = ids.iter().collect();
    let mut out = String::new();
    for id in sorted {
        out.push_str(id);
        out.push('\n');
    }
    out
}

fn normalize(ids: Vec<String>) -> HashSet<String> {
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}
