//! Live command implementation

use anyhow::Result;
use std::time::Duration;

use crate::config::Config;
use crate::error::CommandError;
use crate::live::{self, Credentials, OpenF1Client};
use crate::store::RaceStore;

pub async fn run(store: &RaceStore, config: &Config, interval_secs: u64) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let mut client = OpenF1Client::new(
        &config.live.base_url,
        &config.live.token_url,
        credentials,
        config.live_timeout(),
    )?;

    client
        .authenticate()
        .await
        .map_err(|e| CommandError::AuthenticationFailed(e.to_string()))?;

    println!("Connected to live timing API ({})", config.live.base_url);
    println!("  Polling interval: {}s", interval_secs);
    println!("  Press Ctrl+C to stop\n");

    live::run(client, store, Duration::from_secs(interval_secs.max(1))).await
}
