//! Remote used-item document stored in a GitHub repository
//!
//! Uses the repository contents API: the blob `sha` acts as the version token,
//! and GitHub rejects an update carrying a stale `sha`.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bjj_bot_domain::{RemoteDocument, RemoteDocumentError, VersionedDocument};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the document lives
#[derive(Debug, Clone)]
pub struct GithubLocation {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: Option<String>,
}

/// GitHub contents API document
pub struct GithubDocument {
    client: Client,
    token: SecretString,
    base_url: String,
    location: GithubLocation,
}

impl GithubDocument {
    pub fn new(
        token: SecretString,
        location: GithubLocation,
    ) -> Result<Self, RemoteDocumentError> {
        Self::with_base_url(token, "https://api.github.com".to_string(), location)
    }

    pub fn with_base_url(
        token: SecretString,
        base_url: String,
        location: GithubLocation,
    ) -> Result<Self, RemoteDocumentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("bjj-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteDocumentError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            location,
        })
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url,
            self.location.owner,
            self.location.repo,
            self.location.path.trim_start_matches('/')
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(
                "Authorization",
                format!("Bearer {}", self.token.expose_secret()),
            )
            .header("Accept", "application/vnd.github+json")
    }
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[async_trait]
impl RemoteDocument for GithubDocument {
    async fn read(&self) -> Result<VersionedDocument, RemoteDocumentError> {
        let mut request = self.authorized(self.client.get(self.contents_url()));
        if let Some(branch) = &self.location.branch {
            request = request.query(&[("ref", branch)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteDocumentError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::info!(path = %self.location.path, "Remote document does not exist yet");
                return Ok(VersionedDocument::default());
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(RemoteDocumentError::Unavailable(
                    "Authentication failed".to_string(),
                ));
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteDocumentError::Unavailable(format!(
                    "Failed to read document ({}): {}",
                    status, body
                )));
            }
            _ => {}
        }

        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| RemoteDocumentError::Malformed(e.to_string()))?;

        // GitHub wraps base64 payloads at 60 columns
        let packed: String = contents
            .content
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(packed)
            .map_err(|e| RemoteDocumentError::Malformed(e.to_string()))?;
        let content =
            String::from_utf8(bytes).map_err(|e| RemoteDocumentError::Malformed(e.to_string()))?;

        Ok(VersionedDocument {
            content,
            version: Some(contents.sha),
        })
    }

    async fn write(&self, content: &str, version: Option<&str>) -> Result<(), RemoteDocumentError> {
        let entries = content.lines().filter(|l| !l.trim().is_empty()).count();
        let request = UpdateRequest {
            message: format!("Update used links ({} entries)", entries),
            content: STANDARD.encode(content.as_bytes()),
            sha: version,
            branch: self.location.branch.as_deref(),
        };

        let response = self
            .authorized(self.client.put(self.contents_url()))
            .json(&request)
            .send()
            .await
            .map_err(|e| RemoteDocumentError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(RemoteDocumentError::Conflict)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                RemoteDocumentError::Unavailable("Authentication failed".to_string()),
            ),
            status if status.is_success() => {
                tracing::debug!(path = %self.location.path, entries, "Wrote remote document");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(RemoteDocumentError::Unavailable(format!(
                    "Failed to write document ({}): {}",
                    status, body
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bjj_bot_domain::UsedItemStore;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONTENTS_PATH: &str = "/repos/owner/bot/contents/used_links.txt";

    fn document(server: &MockServer) -> GithubDocument {
        GithubDocument::with_base_url(
            SecretString::new("test-token".into()),
            server.uri(),
            GithubLocation {
                owner: "owner".to_string(),
                repo: "bot".to_string(),
                path: "used_links.txt".to_string(),
                branch: Some("main".to_string()),
            },
        )
        .expect("document")
    }

    #[tokio::test]
    async fn test_read_decodes_wrapped_base64() {
        let server = MockServer::start().await;
        let encoded = STANDARD.encode("https://a\nhttps://b\n");
        let wrapped = format!("{}\n{}\n", &encoded[..10], &encoded[10..]);

        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .and(query_param("ref", "main"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": wrapped,
                "sha": "abc123",
                "encoding": "base64"
            })))
            .mount(&server)
            .await;

        let doc = document(&server).read().await.unwrap();

        assert_eq!(doc.content, "https://a\nhttps://b\n");
        assert_eq!(doc.version.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_read_missing_document_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let doc = document(&server).read().await.unwrap();

        assert!(doc.content.is_empty());
        assert!(doc.version.is_none());
    }

    #[tokio::test]
    async fn test_read_auth_failure_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = document(&server).read().await;

        assert!(matches!(result, Err(RemoteDocumentError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_read_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": "!!not base64!!",
                "sha": "abc123"
            })))
            .mount(&server)
            .await;

        let result = document(&server).read().await;

        assert!(matches!(result, Err(RemoteDocumentError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_write_sends_sha_and_branch() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .and(body_partial_json(serde_json::json!({
                "content": STANDARD.encode("https://a\n"),
                "sha": "abc123",
                "branch": "main"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": {"sha": "def456"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        document(&server)
            .write("https://a\n", Some("abc123"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_stale_sha_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let result = document(&server).write("https://a\n", Some("stale")).await;

        assert!(matches!(result, Err(RemoteDocumentError::Conflict)));
    }

    #[tokio::test]
    async fn test_store_retries_conflict_against_github() {
        let server = MockServer::start().await;

        // First read sees the original document, later reads see a concurrent addition.
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": STANDARD.encode("https://old\n"),
                "sha": "v1"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CONTENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": STANDARD.encode("https://old\nhttps://other\n"),
                "sha": "v2"
            })))
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .and(body_partial_json(serde_json::json!({"sha": "v1"})))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(CONTENTS_PATH))
            .and(body_partial_json(serde_json::json!({
                "sha": "v2",
                "content": STANDARD.encode("https://mine\nhttps://old\nhttps://other\n")
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().expect("temp dir");
        let log = crate::used_log_fs::FileUsedLog::new(dir.path().join("used.txt"))
            .await
            .expect("log");
        let store = UsedItemStore::with_remote(Arc::new(log), Arc::new(document(&server)), 3);

        store.commit("https://mine").await.unwrap();

        assert!(store.contains("https://other"));
        server.verify().await;
    }
}
