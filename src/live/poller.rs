//! Polling cycle: sessions → race, drivers, laps, race control

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::client::{LiveDriver, LiveLap, LiveRaceControl, LiveSession, OpenF1Client};
use crate::incident::{self, DriverKey};
use crate::store::{NewDriver, NewIncident, NewLapTiming, NewRace, RaceStore};

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// `None` when no session was live or completed
    pub race_id: Option<i64>,
    pub label: String,
    pub drivers: usize,
    pub laps: usize,
    pub new_incidents: usize,
}

/// Run a single polling cycle against the store.
///
/// A failure to list sessions aborts the cycle. Failures on the per-session
/// endpoints are logged and that part of the cycle is skipped.
pub async fn poll_once(client: &mut OpenF1Client, store: &RaceStore) -> Result<CycleReport> {
    let sessions = client.sessions().await.context("Sessions unavailable")?;
    let Some(session) = sessions
        .into_iter()
        .find(|s| s.is_live() || s.is_completed())
    else {
        return Ok(CycleReport {
            label: "No active session".to_string(),
            ..Default::default()
        });
    };

    let (Some(session_key), Some(year)) = (session.session_key, session.year()) else {
        anyhow::bail!("Session without key or start date: {:?}", session);
    };
    let round = session.round.unwrap_or(0);

    let race_id = upsert_race(store, &session, year, round)?;
    store.set_race_status(race_id, session.is_live(), session.is_completed())?;

    let drivers = fetch_or_skip("drivers", client.drivers(session_key).await);
    let laps = fetch_or_skip("laps", client.laps(session_key).await);
    let messages = fetch_or_skip("race control", client.race_control(session_key).await);

    let (laps_saved, new_incidents) = store.in_transaction(|store| {
        for driver in &drivers {
            store.upsert_driver(race_id, &new_driver(driver))?;
        }
        let laps_saved = save_laps(store, race_id, &laps)?;
        let new_incidents = save_race_control(store, race_id, &messages)?;
        Ok((laps_saved, new_incidents))
    })?;

    Ok(CycleReport {
        race_id: Some(race_id),
        label: format!(
            "{} R{} {} ({})",
            year,
            round,
            session.session_type.as_deref().unwrap_or("unknown"),
            session.status.as_deref().unwrap_or("")
        ),
        drivers: drivers.len(),
        laps: laps_saved,
        new_incidents,
    })
}

fn fetch_or_skip<T>(what: &str, result: Result<Vec<T>, crate::provider::ProviderError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!("Skipping {} this cycle ({}): {}", what, e.code(), e);
        Vec::new()
    })
}

fn upsert_race(store: &RaceStore, session: &LiveSession, year: i64, round: i64) -> Result<i64> {
    let race = NewRace {
        year,
        round_number: round,
        grand_prix: session.location.clone().unwrap_or_else(|| "Unknown".to_string()),
        country: session.country.clone().unwrap_or_default(),
        circuit_name: session.circuit_short_name.clone().unwrap_or_default(),
        circuit_length_km: 0.0,
        total_laps: 0,
        weather: "—".to_string(),
        air_temp: None,
        track_temp: None,
        data_loaded: true,
    };
    let (race_id, created) = store.get_or_create_race(&race)?;
    if created {
        info!("Created race {} for {} round {}", race_id, year, round);
    }
    Ok(race_id)
}

fn new_driver(driver: &LiveDriver) -> NewDriver {
    let team_color = match driver.team_colour.as_deref().map(|c| c.trim_start_matches('#')) {
        Some(hex) if !hex.is_empty() => format!("#{hex}"),
        _ => "#ffffff".to_string(),
    };
    NewDriver {
        abbreviation: driver.abbreviation.clone().unwrap_or_else(|| "UNK".to_string()),
        full_name: driver.full_name.clone().unwrap_or_else(|| "Unknown".to_string()),
        number: driver.driver_number.unwrap_or(0),
        team: driver.team_name.clone().unwrap_or_default(),
        team_color,
        grid_position: driver.grid_position.unwrap_or(0),
        status: driver.status.clone().unwrap_or_else(|| "Running".to_string()),
        is_fastest_lap: false,
    }
}

fn save_laps(store: &RaceStore, race_id: i64, laps: &[LiveLap]) -> Result<usize> {
    let ids: HashMap<String, i64> = store
        .drivers(race_id)?
        .into_iter()
        .map(|d| (d.abbreviation, d.id))
        .collect();

    let mut saved = 0;
    for lap in laps {
        let (Some(driver_id), Some(lap_number)) = (
            lap.driver_abbreviation.as_ref().and_then(|a| ids.get(a)),
            lap.lap_number,
        ) else {
            debug!("Skipping lap for unknown driver {:?}", lap.driver_abbreviation);
            continue;
        };
        store.upsert_lap_timing(
            race_id,
            &NewLapTiming {
                driver_id: *driver_id,
                lap_number,
                position: lap.lap_position.unwrap_or(0),
                lap_time_ms: lap.duration_ms,
                sector1_ms: lap.sector1_ms,
                sector2_ms: lap.sector2_ms,
                sector3_ms: lap.sector3_ms,
                delta_to_leader_ms: None,
                is_personal_best: lap.is_personal_best.unwrap_or(false),
            },
        )?;
        saved += 1;
    }
    Ok(saved)
}

/// Classify every message; at most one incident per (lap, type) is kept
fn save_race_control(store: &RaceStore, race_id: i64, messages: &[LiveRaceControl]) -> Result<usize> {
    let drivers = store.drivers(race_id)?;
    let keys: Vec<DriverKey<'_>> = drivers
        .iter()
        .map(|d| DriverKey {
            id: d.id,
            abbreviation: d.abbreviation.as_str(),
            number: d.number,
        })
        .collect();

    let mut inserted = 0;
    for msg in messages {
        let text = msg.message.clone().unwrap_or_default();
        let incident = NewIncident {
            driver_id: incident::attribute_driver(&text, msg.driver_number, &keys),
            lap_number: msg.lap_number.unwrap_or(0),
            incident_type: incident::classify(&text),
            description: text,
        };
        if store.insert_incident_once(race_id, &incident)? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Poll every `interval` until Ctrl+C. Failed cycles are logged and retried
/// on the next tick.
pub async fn run(mut client: OpenF1Client, store: &RaceStore, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut iteration: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {}
        }
        iteration += 1;
        let timestamp = chrono::Local::now().format("%H:%M:%S");

        tokio::select! {
            _ = &mut ctrl_c => break,
            result = poll_once(&mut client, store) => match result {
                Ok(report) if report.race_id.is_some() => println!(
                    "[{}] #{} {} - {} drivers, {} laps, {} new incidents",
                    timestamp, iteration, report.label, report.drivers, report.laps,
                    report.new_incidents
                ),
                Ok(report) => println!("[{}] #{} {}", timestamp, iteration, report.label),
                Err(e) => warn!("Cycle #{} failed: {:#}", iteration, e),
            },
        }
    }

    println!("\nLive race monitoring stopped");
    Ok(())
}
