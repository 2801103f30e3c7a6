//! Append-only used-item log on the local filesystem

use async_trait::async_trait;
use bjj_bot_domain::{UsedLog, UsedLogError};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Newline-delimited identifier file, one id per line
#[derive(Debug)]
pub struct FileUsedLog {
    path: PathBuf,
    file: Mutex<fs::File>,
}

impl FileUsedLog {
    /// Open (creating if needed) the log at `path`
    pub async fn new(path: PathBuf) -> Result<Self, UsedLogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        // A hand-edited file may lack the final newline
        let existing = fs::read(&path).await?;
        if existing.last().is_some_and(|b| *b != b'\n') {
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UsedLog for FileUsedLog {
    async fn read_all(&self) -> Result<Vec<String>, UsedLogError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    async fn append(&self, id: &str) -> Result<(), UsedLogError> {
        if id.contains('\n') {
            return Err(UsedLogError::Unavailable(format!(
                "identifier contains a newline: {:?}",
                id
            )));
        }

        let mut file = self.file.lock().await;
        file.write_all(format!("{}\n", id).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
