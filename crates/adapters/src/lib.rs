//! bjj-bot adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `store`: Local used-item log and the GitHub-hosted remote document
//! - `feeds`: JSON feed snapshot provider
//! - `ledger`: File-backed slot ledger
//! - `outbox`: JSONL outbox publisher

mod feed_file;
mod ledger_fs;
pub mod outbox;
mod remote_github;
mod used_log_fs;

/// Re-exports for used-item store adapters
pub mod store {
    pub use crate::remote_github::{GithubDocument, GithubLocation};
    pub use crate::used_log_fs::FileUsedLog;
}

/// Re-exports for feed adapters
pub mod feeds {
    pub use crate::feed_file::JsonFeedFile;
}

/// Re-exports for slot ledger adapters
pub mod ledger {
    pub use crate::ledger_fs::FileSlotLedger;
}
