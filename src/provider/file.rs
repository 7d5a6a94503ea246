//! Session document read from a local file (`load --file`)

use std::path::PathBuf;

use async_trait::async_trait;

use super::{ProviderError, SessionData, SessionSource};

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    /// The file is taken to hold the requested session as-is
    async fn fetch_session(&self, _year: i64, _round: i64) -> Result<SessionData, ProviderError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ProviderError::io(&self.path, e))?;
        SessionData::from_slice(&bytes)
    }
}
