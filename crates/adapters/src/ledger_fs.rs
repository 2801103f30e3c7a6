//! File-backed slot ledger

use async_trait::async_trait;
use bjj_bot_domain::{LedgerError, SlotKey, SlotLedger};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Stores the last fired slot key as a small JSON document
#[derive(Debug, Clone)]
pub struct FileSlotLedger {
    path: PathBuf,
}

impl FileSlotLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SlotLedger for FileSlotLedger {
    async fn last_fired(&self) -> Result<Option<SlotKey>, LedgerError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    async fn record(&self, key: &SlotKey) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json =
            serde_json::to_string(key).map_err(|e| LedgerError::Serialization(e.to_string()))?;

        // Write-then-rename keeps the ledger readable if we die mid-write
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
