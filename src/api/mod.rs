//! Read-only JSON API for the dashboard
//!
//! Each request opens its own read-only connection on a blocking worker, so
//! handlers never share SQLite state and never block the runtime.

pub mod format;
pub mod views;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::store::RaceStore;

#[derive(Clone)]
pub struct AppState {
    db_path: Arc<PathBuf>,
}

pub fn router(db_path: PathBuf) -> Router {
    let state = AppState {
        db_path: Arc::new(db_path),
    };
    Router::new()
        .route("/api/race/", get(api_race))
        .route("/api/ranking/", get(api_ranking))
        .route("/api/laptimes/", get(api_laptimes))
        .route("/api/telemetry/{abbreviation}/", get(api_telemetry))
        .route("/api/incidents/", get(api_incidents))
        .route("/api/drivers/", get(api_drivers))
        .with_state(state)
}

/// Serve until Ctrl+C
pub async fn serve(listener: TcpListener, db_path: PathBuf) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "paddock HTTP API ready");
    axum::serve(listener, router(db_path))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

/// Run a payload builder against a fresh connection
async fn respond<F>(state: AppState, endpoint: &'static str, build: F) -> Json<Value>
where
    F: FnOnce(&RaceStore) -> Result<Value> + Send + 'static,
{
    let db_path = state.db_path.clone();
    let result = tokio::task::spawn_blocking(move || {
        let store = RaceStore::open_read_only(&db_path)?;
        build(&store)
    })
    .await;

    match result {
        Ok(Ok(body)) => Json(body),
        Ok(Err(e)) => {
            error!(endpoint, "request failed: {:#}", e);
            Json(json!({ "status": "error", "message": "Internal error." }))
        }
        Err(e) => {
            error!(endpoint, "worker join error: {}", e);
            Json(json!({ "status": "error", "message": "Internal error." }))
        }
    }
}

async fn api_race(State(state): State<AppState>) -> Json<Value> {
    respond(state, "race", views::race_payload).await
}

async fn api_ranking(State(state): State<AppState>) -> Json<Value> {
    respond(state, "ranking", views::ranking_payload).await
}

async fn api_laptimes(State(state): State<AppState>) -> Json<Value> {
    respond(state, "laptimes", views::laptimes_payload).await
}

async fn api_telemetry(
    State(state): State<AppState>,
    Path(abbreviation): Path<String>,
) -> Json<Value> {
    respond(state, "telemetry", move |store| {
        views::telemetry_payload(store, &abbreviation)
    })
    .await
}

async fn api_incidents(State(state): State<AppState>) -> Json<Value> {
    respond(state, "incidents", views::incidents_payload).await
}

async fn api_drivers(State(state): State<AppState>) -> Json<Value> {
    respond(state, "drivers", views::drivers_payload).await
}
