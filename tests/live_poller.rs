use std::time::Duration;

use paddock::live::{poll_once, Credentials, OpenF1Client};
use paddock::model::IncidentType;
use paddock::store::RaceTable;
use paddock::RaceStore;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "expires_in": 3600,
        })))
        .mount(server)
        .await;
}

/// Token endpoint issuing `expires_in` and expecting exactly `calls` grants
async fn mount_counted_token(server: &MockServer, expires_in: u64, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "expires_in": expires_in,
        })))
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_quiet_session(server: &MockServer) {
    mount_session(server, "live").await;
    mount_get(server, "/drivers", drivers()).await;
    mount_get(server, "/laps", json!([])).await;
    mount_get(server, "/race_control", json!([])).await;
}

async fn mount_get(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(query_param("session_key", "9158"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_session(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "session_key": 9000, "session_type": "Practice", "status": "upcoming",
              "date_start": "2026-03-07T12:00:00+00:00", "round": 2 },
            { "session_key": 9158, "session_type": "Race", "status": status,
              "date_start": "2026-03-08T15:00:00+00:00", "round": 2,
              "location": "Jeddah", "country": "Saudi Arabia", "circuit_short_name": "Jeddah" },
        ])))
        .mount(server)
        .await;
}

fn drivers() -> serde_json::Value {
    json!([
        { "abbreviation": "VER", "full_name": "Max Verstappen", "driver_number": 1,
          "team_name": "Red Bull Racing", "team_colour": "3671C6", "grid_position": 1 },
        { "abbreviation": "LEC", "full_name": "Charles Leclerc", "driver_number": 16,
          "team_name": "Ferrari", "team_colour": "E8002D", "grid_position": 2 },
    ])
}

fn client(server: &MockServer) -> OpenF1Client {
    OpenF1Client::new(
        server.uri(),
        format!("{}/token", server.uri()),
        Credentials::new("user", "secret"),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn poll_cycle_upserts_race_drivers_laps_and_incidents() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_session(&server, "live").await;
    mount_get(&server, "/drivers", drivers()).await;
    mount_get(
        &server,
        "/laps",
        json!([
            { "driver_abbreviation": "VER", "lap_number": 1, "duration_ms": 92000.0, "lap_position": 1 },
            { "driver_abbreviation": "LEC", "lap_number": 1, "duration_ms": 92400.0, "lap_position": 2 },
            { "driver_abbreviation": "ZZZ", "lap_number": 1, "duration_ms": 99000.0, "lap_position": 3 },
        ]),
    )
    .await;
    mount_get(
        &server,
        "/race_control",
        json!([
            { "lap_number": 1, "message": "SAFETY CAR DEPLOYED" },
            { "lap_number": 1, "message": "SAFETY CAR DEPLOYED - DEBRIS TURN 13" },
            { "lap_number": 1, "message": "CAR 16 (LEC) 5 SECOND TIME PENALTY", "driver_number": 16 },
            { "lap_number": 1, "message": "DRS ENABLED" },
        ]),
    )
    .await;

    let store = RaceStore::open_in_memory().unwrap();
    let mut client = client(&server);
    client.authenticate().await.unwrap();

    let report = poll_once(&mut client, &store).await.unwrap();
    let race_id = report.race_id.unwrap();
    assert_eq!(report.drivers, 2);
    assert_eq!(report.laps, 2);
    assert_eq!(report.new_incidents, 3);

    let race = store.get_race(race_id).unwrap().unwrap();
    assert_eq!((race.year, race.round_number), (2026, 2));
    assert_eq!(race.grand_prix, "Jeddah");
    assert!(race.is_running && !race.is_finished && race.data_loaded);

    let lec = store.find_driver(race_id, "LEC").unwrap().unwrap();
    assert_eq!(lec.team_color, "#E8002D");
    let penalties = store.incidents(race_id, 1).unwrap();
    let penalty = penalties
        .iter()
        .find(|i| i.incident_type == IncidentType::Penalty)
        .unwrap();
    assert_eq!(penalty.driver_abbreviation.as_deref(), Some("LEC"));

    // Same data again: rows are updated in place, incidents are not repeated
    let again = poll_once(&mut client, &store).await.unwrap();
    assert_eq!(again.race_id, Some(race_id));
    assert_eq!(again.new_incidents, 0);
    assert_eq!(store.count_rows(RaceTable::Drivers, race_id).unwrap(), 2);
    assert_eq!(store.count_rows(RaceTable::LapTimings, race_id).unwrap(), 2);
    assert_eq!(store.count_rows(RaceTable::Incidents, race_id).unwrap(), 3);
}

#[tokio::test]
async fn poll_cycle_updates_lap_rows_in_place() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_session(&server, "live").await;
    mount_get(&server, "/drivers", drivers()).await;
    mount_get(&server, "/race_control", json!([])).await;

    // First cycle sees the lap without a time, later cycles with one
    Mock::given(method("GET"))
        .and(path("/laps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "driver_abbreviation": "VER", "lap_number": 3, "duration_ms": null, "lap_position": 1 },
        ])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/laps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "driver_abbreviation": "VER", "lap_number": 3, "duration_ms": 91234.0, "lap_position": 1 },
        ])))
        .with_priority(2)
        .mount(&server)
        .await;

    let store = RaceStore::open_in_memory().unwrap();
    let mut client = client(&server);

    let first = poll_once(&mut client, &store).await.unwrap();
    let race_id = first.race_id.unwrap();
    let lap = store.timings_at_lap(race_id, 3).unwrap();
    assert_eq!(lap.len(), 1);
    assert_eq!(lap[0].lap_time_ms, None);

    poll_once(&mut client, &store).await.unwrap();
    let lap = store.timings_at_lap(race_id, 3).unwrap();
    assert_eq!(lap.len(), 1);
    assert_eq!(lap[0].lap_time_ms, Some(91234.0));
}

#[tokio::test]
async fn poll_cycle_skips_failed_endpoints_and_marks_completion() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_session(&server, "completed").await;
    mount_get(&server, "/drivers", drivers()).await;
    Mock::given(method("GET"))
        .and(path("/laps"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_get(&server, "/race_control", json!([])).await;

    let store = RaceStore::open_in_memory().unwrap();
    let mut client = client(&server);

    let report = poll_once(&mut client, &store).await.unwrap();
    assert_eq!(report.drivers, 2);
    assert_eq!(report.laps, 0);

    let race = store.get_race(report.race_id.unwrap()).unwrap().unwrap();
    assert!(!race.is_running);
    assert!(race.is_finished);
}

#[tokio::test]
async fn poll_cycle_without_active_session_writes_nothing() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "session_key": 1, "status": "upcoming", "date_start": "2026-03-08T15:00:00+00:00" },
        ])))
        .mount(&server)
        .await;

    let store = RaceStore::open_in_memory().unwrap();
    let mut client = client(&server);

    let report = poll_once(&mut client, &store).await.unwrap();
    assert_eq!(report.race_id, None);
    assert!(store.list_races(None, false).unwrap().is_empty());
}

#[tokio::test]
async fn rejected_credentials_fail_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut client = client(&server);
    let err = client.authenticate().await.unwrap_err();
    assert_eq!(err.code(), "http_status");
}

#[tokio::test]
async fn long_lived_token_is_reused_across_cycles() {
    let server = MockServer::start().await;
    mount_counted_token(&server, 3600, 1).await;
    mount_quiet_session(&server).await;

    let store = RaceStore::open_in_memory().unwrap();
    let mut client = client(&server);
    assert_eq!(client.authenticate().await.unwrap(), 3600);

    poll_once(&mut client, &store).await.unwrap();
    poll_once(&mut client, &store).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn token_inside_refresh_margin_is_renewed_before_each_request() {
    let server = MockServer::start().await;
    // A 60 s lifetime is already within the refresh margin: the initial grant
    // plus one renewal for each of the four requests of a cycle
    mount_counted_token(&server, 60, 5).await;
    mount_quiet_session(&server).await;

    let store = RaceStore::open_in_memory().unwrap();
    let mut client = client(&server);
    client.authenticate().await.unwrap();

    poll_once(&mut client, &store).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn token_is_renewed_once_the_margin_is_reached() {
    let server = MockServer::start().await;
    // 61 s lifetime leaves one second before the refresh point
    mount_counted_token(&server, 61, 2).await;
    mount_quiet_session(&server).await;

    let store = RaceStore::open_in_memory().unwrap();
    let mut client = client(&server);
    client.authenticate().await.unwrap();

    poll_once(&mut client, &store).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    poll_once(&mut client, &store).await.unwrap();
    server.verify().await;
}
