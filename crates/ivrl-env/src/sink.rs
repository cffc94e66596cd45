//! Destinations for scored groups

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use ivrl_core::{IvrlError, Result, ScoredGroup};

/// Receives every group that survives scoring
#[async_trait]
pub trait GroupSink: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, group: &ScoredGroup) -> Result<()>;
}

/// Posts groups to the trainer API at `{base_url}/scored_data`
pub struct HttpGroupSink {
    client: Client,
    url: String,
}

impl HttpGroupSink {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| IvrlError::Sink(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/scored_data", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GroupSink for HttpGroupSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, group: &ScoredGroup) -> Result<()> {
        debug!("POST {} ({} rollouts)", self.url, group.len());

        let response = self
            .client
            .post(&self.url)
            .json(group)
            .send()
            .await
            .map_err(|e| IvrlError::Sink(format!("Failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IvrlError::Sink(format!("Request failed ({status}): {body}")));
        }

        Ok(())
    }
}

/// Appends each group as one JSON line
pub struct JsonlGroupSink {
    path: PathBuf,
    // Serializes appends from concurrent senders
    lock: Mutex<()>,
}

impl JsonlGroupSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl GroupSink for JsonlGroupSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn send(&self, group: &ScoredGroup) -> Result<()> {
        let mut line = serde_json::to_string(group)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| IvrlError::Sink(format!("Failed to open {}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> ScoredGroup {
        let mut group = ScoredGroup::new();
        group.push(vec![1, 2, 3], vec![-100, 2, 3], 1.0);
        group.push(vec![1, 2, 4], vec![-100, 2, 4], -1.0);
        group
    }

    #[test]
    fn test_http_sink_url() {
        let sink = HttpGroupSink::new("http://localhost:8000/").unwrap();
        assert_eq!(sink.url(), "http://localhost:8000/scored_data");
        assert_eq!(sink.name(), "http");
    }

    #[tokio::test]
    async fn test_jsonl_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.jsonl");
        let sink = JsonlGroupSink::new(&path);

        sink.send(&group()).await.unwrap();
        sink.send(&group()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let groups: Vec<ScoredGroup> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], group());
    }
}
