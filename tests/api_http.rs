use std::path::PathBuf;

use paddock::api;
use paddock::cli::generate;
use paddock::store::{NewDriver, NewRace, RaceProgress};
use paddock::model::SafetyCar;
use paddock::RaceStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Serve the API for `db_path` on an ephemeral port, returning its base URL
async fn spawn_api(db_path: PathBuf) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(db_path)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn get(base: &str, endpoint: &str) -> Value {
    let response = reqwest::get(format!("{base}{endpoint}")).await.unwrap();
    assert!(response.status().is_success(), "{endpoint}: {}", response.status());
    response.json().await.unwrap()
}

fn seed_pending_race(store: &RaceStore) -> i64 {
    let race_id = store
        .create_race(&NewRace {
            year: 2025,
            round_number: 1,
            grand_prix: "Australian Grand Prix".to_string(),
            country: "Australia".to_string(),
            circuit_name: "Albert Park".to_string(),
            circuit_length_km: 5.278,
            total_laps: 58,
            weather: "Dry".to_string(),
            air_temp: Some(22.1),
            track_temp: None,
            data_loaded: true,
        })
        .unwrap();
    for (grid, abbr) in [(2, "NOR"), (1, "VER")] {
        store
            .insert_driver(
                race_id,
                &NewDriver {
                    abbreviation: abbr.to_string(),
                    full_name: abbr.to_string(),
                    number: grid,
                    team: "Team".to_string(),
                    team_color: "#ffffff".to_string(),
                    grid_position: grid,
                    status: "Running".to_string(),
                    is_fastest_lap: false,
                },
            )
            .unwrap();
    }
    race_id
}

#[tokio::test]
async fn endpoints_report_no_race_on_empty_database() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("paddock.db");
    RaceStore::open(&db_path).unwrap();
    let base = spawn_api(db_path).await;

    for endpoint in [
        "/api/race/",
        "/api/ranking/",
        "/api/laptimes/",
        "/api/incidents/",
        "/api/drivers/",
        "/api/telemetry/VER/",
    ] {
        let body = get(&base, endpoint).await;
        assert_eq!(body["status"], "no_race", "{endpoint}");
    }
    let ranking = get(&base, "/api/ranking/").await;
    assert_eq!(ranking["drivers"], serde_json::json!([]));
}

#[tokio::test]
async fn pending_race_shows_grid_order() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("paddock.db");
    let store = RaceStore::open(&db_path).unwrap();
    seed_pending_race(&store);
    let base = spawn_api(db_path).await;

    let race = get(&base, "/api/race/").await;
    assert_eq!(race["status"], "ok");
    assert_eq!(race["race"]["grand_prix"], "Australian Grand Prix");
    assert_eq!(race["race"]["current_lap"], 0);
    assert_eq!(race["race"]["safety_car"], "NONE");
    assert!(race["race"]["track_temp"].is_null());

    let ranking = get(&base, "/api/ranking/").await;
    let drivers = ranking["drivers"].as_array().unwrap();
    assert_eq!(drivers.len(), 2);
    assert_eq!(drivers[0]["abbreviation"], "VER");
    assert_eq!(drivers[0]["position"], 1);
    assert_eq!(drivers[0]["lap_time"], "—");
    assert_eq!(drivers[0]["delta"], "—");

    let telemetry = get(&base, "/api/telemetry/ver/").await;
    assert_eq!(telemetry["status"], "ok");
    assert_eq!(telemetry["driver"], "VER");
    assert!(telemetry["telemetry"].is_null());

    let unknown = get(&base, "/api/telemetry/XYZ/").await;
    assert_eq!(unknown["status"], "error");
}

#[tokio::test]
async fn running_race_exposes_timings_and_incidents_up_to_current_lap() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("paddock.db");
    let store = RaceStore::open(&db_path).unwrap();
    let summary = generate::generate(&store, 20, &mut StdRng::seed_from_u64(42)).unwrap();
    let base = spawn_api(db_path).await;

    let ranking = get(&base, "/api/ranking/").await;
    assert_eq!(ranking["current_lap"], 20);
    let drivers = ranking["drivers"].as_array().unwrap();
    assert_eq!(drivers.len(), 10);
    assert_eq!(drivers[0]["position"], 1);
    assert_eq!(drivers[0]["delta"], "LEADER");
    assert_eq!(drivers[1]["delta"], "+0.500s");

    let laptimes = get(&base, "/api/laptimes/").await;
    let ver = &laptimes["data"]["VER"];
    assert_eq!(ver["laps"].as_array().unwrap().len(), 20);

    let incidents = get(&base, "/api/incidents/").await;
    let list = incidents["incidents"].as_array().unwrap();
    assert_eq!(list.len(), 3);
    // Newest lap first
    assert_eq!(list[0]["lap"], 18);
    assert_eq!(list[0]["type"], "PENALTY");

    // Rewind: later incidents disappear from the feed
    store
        .save_progress(
            summary.race_id,
            &RaceProgress {
                current_lap: 10,
                is_running: true,
                is_finished: false,
                safety_car: SafetyCar::None,
            },
        )
        .unwrap();
    let incidents = get(&base, "/api/incidents/").await;
    let list = incidents["incidents"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["type"], "SC");
}
