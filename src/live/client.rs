//! OpenF1-style live timing client

use std::time::{Duration, Instant};

use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use super::Credentials;
use crate::provider::{lenient, ProviderError};

/// Refresh this long before the server-side expiry
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// Authenticated client; the bearer token is renewed transparently
#[derive(Debug)]
pub struct OpenF1Client {
    client: reqwest::Client,
    base_url: String,
    token_url: String,
    credentials: Credentials,
    token: Option<AccessToken>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "lenient::integer")]
    expires_in: Option<i64>,
}

impl OpenF1Client {
    pub fn new(
        base_url: impl Into<String>,
        token_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into(),
            credentials,
            token: None,
        })
    }

    /// OAuth2 password grant. Returns the token lifetime in seconds.
    pub async fn authenticate(&mut self) -> Result<u64, ProviderError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: self.token_url.clone(),
            });
        }

        let body: TokenResponse = response.json().await?;
        let expires_in = body
            .expires_in
            .filter(|s| *s > 0)
            .map(|s| s as u64)
            .unwrap_or(DEFAULT_EXPIRES_IN);
        let lifetime = Duration::from_secs(expires_in);

        self.token = Some(AccessToken {
            value: body.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        info!("OAuth2 token acquired (expires in {}s)", expires_in);
        Ok(expires_in)
    }

    async fn bearer(&mut self) -> Result<String, ProviderError> {
        let expired = self
            .token
            .as_ref()
            .map_or(true, |t| Instant::now() >= t.refresh_at);
        if expired {
            debug!("Refreshing access token");
            self.authenticate().await?;
        }
        self.token
            .as_ref()
            .map(|t| t.value.clone())
            .ok_or_else(|| ProviderError::config("no access token after authentication"))
    }

    async fn get_json<T: DeserializeOwned>(&mut self, endpoint: &str) -> Result<T, ProviderError> {
        let token = self.bearer().await?;
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.json().await?)
    }

    pub async fn sessions(&mut self) -> Result<Vec<LiveSession>, ProviderError> {
        self.get_json("/sessions").await
    }

    pub async fn drivers(&mut self, session_key: i64) -> Result<Vec<LiveDriver>, ProviderError> {
        self.get_json(&format!("/drivers?session_key={session_key}")).await
    }

    pub async fn laps(&mut self, session_key: i64) -> Result<Vec<LiveLap>, ProviderError> {
        self.get_json(&format!("/laps?session_key={session_key}")).await
    }

    pub async fn race_control(
        &mut self,
        session_key: i64,
    ) -> Result<Vec<LiveRaceControl>, ProviderError> {
        self.get_json(&format!("/race_control?session_key={session_key}"))
            .await
    }
}

// ============================================
// API TYPES
// ============================================

#[derive(Debug, Clone, Deserialize)]
pub struct LiveSession {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub session_key: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub session_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date_start: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub round: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub circuit_short_name: Option<String>,
}

impl LiveSession {
    pub fn is_live(&self) -> bool {
        self.status.as_deref() == Some("live")
    }

    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }

    /// Season from the leading `YYYY` of `date_start`
    pub fn year(&self) -> Option<i64> {
        self.date_start.as_deref()?.get(..4)?.parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveDriver {
    #[serde(default, deserialize_with = "lenient::text")]
    pub abbreviation: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub driver_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub team_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub team_colour: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub grid_position: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveLap {
    #[serde(default, deserialize_with = "lenient::text")]
    pub driver_abbreviation: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub lap_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub duration_ms: Option<f64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub lap_position: Option<i64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sector1_ms: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sector2_ms: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sector3_ms: Option<f64>,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub is_personal_best: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveRaceControl {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub lap_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub driver_number: Option<i64>,
}
