//! Outbox publisher: appends rendered messages to a JSONL file for the channel relay.

use async_trait::async_trait;
use bjj_bot_domain::model::RenderedMessage;
use bjj_bot_domain::ports::{PublishError, Publisher};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct OutboxWriter {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl OutboxWriter {
    pub async fn new(path: PathBuf) -> Result<Self, OutboxError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: &OutboxEntry<'_>) -> Result<(), OutboxError> {
        // One complete line per write so the relay never sees a partial message
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OutboxPublisher {
    writer: OutboxWriter,
}

impl OutboxPublisher {
    pub fn new(writer: OutboxWriter) -> Self {
        Self { writer }
    }
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    id: Uuid,
    destination: &'a str,
    format: &'a str,
    text: &'a str,
    queued_at: String,
}

#[async_trait]
impl Publisher for OutboxPublisher {
    async fn send(
        &self,
        destination: &str,
        message: &RenderedMessage,
    ) -> Result<(), PublishError> {
        if destination.trim().is_empty() {
            return Err(PublishError::Rejected("empty destination".to_string()));
        }
        if message.text.trim().is_empty() {
            return Err(PublishError::Rejected("empty message".to_string()));
        }

        let entry = OutboxEntry {
            id: Uuid::new_v4(),
            destination,
            format: message.format.as_str(),
            text: &message.text,
            queued_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
        };

        self.writer.append(&entry).await.map_err(|error| {
            PublishError::Unreachable(format!("Outbox write failed: {}", error))
        })?;

        tracing::debug!(outbox = %self.writer.path().display(), id = %entry.id, "Queued message");
        Ok(())
    }

    fn platform(&self) -> &'static str {
        "outbox"
    }
}
