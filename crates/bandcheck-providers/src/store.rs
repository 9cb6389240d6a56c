//! Score persistence backends.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use bandcheck_core::traits::{ScoreRecord, ScoreStore};

use crate::http::{build_client, check_status, send_error};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TABLE: &str = "test_scores";

/// Inserts score rows into a PostgREST-style table endpoint
/// (`POST {url}/rest/v1/{table}`).
pub struct RestStore {
    url: String,
    api_key: String,
    table: String,
    client: reqwest::Client,
}

impl RestStore {
    pub fn new(url: &str, api_key: &str, table: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            client: build_client(DEFAULT_TIMEOUT_SECS)?,
        })
    }
}

#[async_trait]
impl ScoreStore for RestStore {
    fn name(&self) -> &str {
        "rest"
    }

    #[instrument(skip(self, record), fields(table = %self.table, test_id = %record.test_id))]
    async fn save(&self, record: &ScoreRecord) -> anyhow::Result<()> {
        let response = self
            .client
            .post(format!("{}/rest/v1/{}", self.url, self.table))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| send_error(e, DEFAULT_TIMEOUT_SECS))?;
        check_status(response).await?;

        tracing::debug!("score saved");
        Ok(())
    }
}

/// Appends one JSON record per line to a local file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read every record back, skipping lines that do not parse.
    pub fn load(&self) -> anyhow::Result<Vec<ScoreRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::warn!("skipping malformed record in {}: {e}", self.path.display());
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl ScoreStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, record: &ScoreRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(record).context("failed to serialize score")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// Discards every record. Used when no store is configured.
pub struct NoopStore;

#[async_trait]
impl ScoreStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn save(&self, record: &ScoreRecord) -> anyhow::Result<()> {
        tracing::debug!("no score store configured, not saving {}", record.test_id);
        Ok(())
    }
}
