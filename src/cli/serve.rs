//! Serve command implementation

use anyhow::{Context, Result};
use std::path::Path;
use tokio::net::TcpListener;

use crate::api;
use crate::store::RaceStore;

pub async fn run(db_path: &Path, addr: &str) -> Result<()> {
    // Create the database and schema up front; requests open read-only
    RaceStore::open(db_path)?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP on {addr}"))?;
    println!("Serving dashboard API on http://{}/api/race/", listener.local_addr()?);
    println!("Press Ctrl+C to stop");

    api::serve(listener, db_path.to_path_buf()).await
}
