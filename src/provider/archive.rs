//! HTTP session archive with an on-disk cache

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ProviderError, SessionData, SessionSource};

/// Fetches `{base_url}/{year}/{round}/race.json`, caching the raw document
/// under `{cache_dir}/{year}/{round:02}/race.json`.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    client: reqwest::Client,
    base_url: String,
    cache_dir: PathBuf,
}

impl ArchiveSource {
    pub fn new(
        base_url: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ProviderError::config("provider base_url is empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            cache_dir: cache_dir.into(),
        })
    }

    fn session_url(&self, year: i64, round: i64) -> String {
        format!("{}/{}/{}/race.json", self.base_url, year, round)
    }

    pub fn cache_path(&self, year: i64, round: i64) -> PathBuf {
        self.cache_dir
            .join(year.to_string())
            .join(format!("{round:02}"))
            .join("race.json")
    }

    async fn download(&self, year: i64, round: i64) -> Result<Vec<u8>, ProviderError> {
        let url = self.session_url(year, round);
        info!("Downloading session {} round {} from {}", year, round, url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound { year, round });
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

async fn write_cache(path: &Path, bytes: &[u8]) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ProviderError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ProviderError::io(path, e))
}

#[async_trait]
impl SessionSource for ArchiveSource {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch_session(&self, year: i64, round: i64) -> Result<SessionData, ProviderError> {
        let cache_path = self.cache_path(year, round);

        match tokio::fs::read(&cache_path).await {
            Ok(bytes) => {
                debug!("Using cached session {}", cache_path.display());
                return SessionData::from_slice(&bytes);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ProviderError::io(&cache_path, e)),
        }

        let bytes = self.download(year, round).await?;
        // Only cache documents that decode
        let session = SessionData::from_slice(&bytes)?;
        write_cache(&cache_path, &bytes).await?;
        Ok(session)
    }
}
