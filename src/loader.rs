//! One-shot batch import of a completed race
//!
//! Fetches the session from a [`SessionSource`], writes the race and every
//! child table in one transaction, runs the derivations over what was stored
//! and only then flips `data_loaded`. A failed load leaves nothing behind.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::derive::{
    compute_deltas, derive_stints, detect_pit_stops, select_telemetry_laps, PitLap, StintLap,
    TelemetryTrace,
};
use crate::incident::{self, DriverKey};
use crate::model::IncidentType;
use crate::provider::{LapRecord, ResultRow, SessionData, SessionSource, WeatherSample};
use crate::store::{NewDriver, NewIncident, NewLapTiming, NewRace, RaceStore, RaceTable};

/// Finishers whose telemetry is kept
const TELEMETRY_DRIVERS: usize = 5;

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(LoadSummary),
    /// The race was already loaded and `force` was not given; nothing was written
    AlreadyLoaded { race_id: i64, grand_prix: String },
}

#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub race_id: i64,
    pub grand_prix: String,
    pub circuit_name: String,
    pub total_laps: i64,
    pub drivers: i64,
    pub lap_timings: i64,
    pub pit_stops: i64,
    pub tyre_stints: i64,
    pub telemetry_laps: i64,
    pub incidents: i64,
}

/// Load (year, round) into the store.
pub async fn load_race(
    store: &RaceStore,
    source: &dyn SessionSource,
    year: i64,
    round: i64,
    force: bool,
) -> Result<LoadOutcome> {
    if let Some(existing) = store.find_race(year, round)? {
        if existing.data_loaded && !force {
            return Ok(LoadOutcome::AlreadyLoaded {
                race_id: existing.id,
                grand_prix: existing.grand_prix,
            });
        }
    }

    info!("Fetching {} round {} from {}", year, round, source.describe());
    let session = source
        .fetch_session(year, round)
        .await
        .with_context(|| format!("Failed to fetch race data for {year} round {round}"))?;

    let summary = store.in_transaction(|store| {
        if let Some(existing) = store.find_race(year, round)? {
            info!("Replacing existing race {} ({})", existing.id, existing.grand_prix);
            store.delete_race(existing.id)?;
        }
        populate(store, year, round, &session)
    })?;

    Ok(LoadOutcome::Loaded(summary))
}

/// Write one session into the store. Caller owns the transaction.
pub fn populate(store: &RaceStore, year: i64, round: i64, session: &SessionData) -> Result<LoadSummary> {
    let total_laps = session
        .laps
        .iter()
        .filter_map(|l| l.lap_number)
        .max()
        .unwrap_or(0);

    let race = NewRace {
        year,
        round_number: round,
        grand_prix: session
            .event
            .event_name
            .clone()
            .unwrap_or_else(|| format!("Round {round}")),
        country: session.event.country.clone().unwrap_or_else(|| "—".to_string()),
        circuit_name: session.event.location.clone().unwrap_or_else(|| "—".to_string()),
        circuit_length_km: session.event.circuit_length_km.unwrap_or(0.0),
        total_laps,
        weather: weather_label(&session.weather).to_string(),
        air_temp: mean_temp(session.weather.iter().map(|w| w.air_temp)),
        track_temp: mean_temp(session.weather.iter().map(|w| w.track_temp)),
        data_loaded: false,
    };
    let race_id = store.create_race(&race)?;
    info!("Created race {} ({} laps)", race.grand_prix, total_laps);

    let drivers = save_drivers(store, race_id, &session.results)?;
    info!("Saved {} drivers", drivers.len());

    save_lap_timings(store, race_id, &drivers, &session.laps)?;
    save_deltas(store, race_id, total_laps)?;

    let laps_by_driver = group_laps(&drivers, &session.laps);
    save_pit_stops(store, race_id, &laps_by_driver)?;
    save_stints(store, race_id, &laps_by_driver)?;
    save_telemetry(store, race_id, &drivers, session, &laps_by_driver, total_laps)?;
    save_incidents(store, race_id, &drivers, session, &laps_by_driver)?;

    store.set_data_loaded(race_id, true)?;

    Ok(LoadSummary {
        race_id,
        grand_prix: race.grand_prix,
        circuit_name: race.circuit_name,
        total_laps,
        drivers: store.count_rows(RaceTable::Drivers, race_id)?,
        lap_timings: store.count_rows(RaceTable::LapTimings, race_id)?,
        pit_stops: store.count_rows(RaceTable::PitStops, race_id)?,
        tyre_stints: store.count_rows(RaceTable::TyreStints, race_id)?,
        telemetry_laps: store.count_rows(RaceTable::Telemetry, race_id)?,
        incidents: store.count_rows(RaceTable::Incidents, race_id)?,
    })
}

/// Stored driver, keyed by abbreviation in [`DriverMap`]
#[derive(Debug, Clone)]
struct LoadedDriver {
    id: i64,
    number: i64,
    full_name: String,
}

type DriverMap = HashMap<String, LoadedDriver>;

// ============================================
// RACE METADATA
// ============================================

fn weather_label(samples: &[WeatherSample]) -> &'static str {
    if samples.is_empty() {
        "—"
    } else if samples.iter().any(|w| w.rainfall == Some(true)) {
        "Rain"
    } else {
        "Dry"
    }
}

/// Mean of the readable samples, rounded to one decimal
fn mean_temp(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let readings: Vec<f64> = values.flatten().collect();
    if readings.is_empty() {
        return None;
    }
    let mean = readings.iter().sum::<f64>() / readings.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

/// `ff8000`, `#ff8000` and `##ff8000` all become `#ff8000`
fn normalize_team_color(raw: Option<&str>) -> String {
    let hex = raw.unwrap_or("").trim().trim_start_matches('#');
    if hex.is_empty() {
        "#ffffff".to_string()
    } else {
        format!("#{hex}")
    }
}

// ============================================
// DRIVERS & LAPS
// ============================================

fn save_drivers(store: &RaceStore, race_id: i64, results: &[ResultRow]) -> Result<DriverMap> {
    let mut drivers = DriverMap::new();
    for row in results {
        let Some(abbr) = row.abbreviation.clone() else {
            debug!("Skipping result row without abbreviation");
            continue;
        };
        if drivers.contains_key(&abbr) {
            debug!("Skipping duplicate result row for {}", abbr);
            continue;
        }

        let driver = NewDriver {
            full_name: row.full_name.clone().unwrap_or_else(|| abbr.clone()),
            number: row.driver_number.unwrap_or(0),
            team: row.team_name.clone().unwrap_or_else(|| "—".to_string()),
            team_color: normalize_team_color(row.team_color.as_deref()),
            grid_position: row.grid_position.unwrap_or(0),
            status: row.status.clone().unwrap_or_else(|| "Running".to_string()),
            is_fastest_lap: false,
            abbreviation: abbr.clone(),
        };
        let id = store.insert_driver(race_id, &driver)?;
        drivers.insert(
            abbr,
            LoadedDriver {
                id,
                number: driver.number,
                full_name: driver.full_name,
            },
        );
    }
    Ok(drivers)
}

fn save_lap_timings(
    store: &RaceStore,
    race_id: i64,
    drivers: &DriverMap,
    laps: &[LapRecord],
) -> Result<()> {
    let mut fastest: Option<(f64, i64)> = None;
    let mut saved = 0;

    for lap in laps {
        let (Some(driver), Some(lap_number)) = (
            lap.driver.as_ref().and_then(|abbr| drivers.get(abbr)),
            lap.lap_number,
        ) else {
            debug!("Skipping lap for unknown driver {:?}", lap.driver);
            continue;
        };

        let lap_time_ms = lap.lap_time_ms.filter(|ms| *ms > 0.0);
        if let Some(ms) = lap_time_ms {
            if fastest.map_or(true, |(best, _)| ms < best) {
                fastest = Some((ms, driver.id));
            }
        }

        store.insert_lap_timing(
            race_id,
            &NewLapTiming {
                driver_id: driver.id,
                lap_number,
                position: lap.position.unwrap_or(0),
                lap_time_ms,
                sector1_ms: lap.sector1_ms,
                sector2_ms: lap.sector2_ms,
                sector3_ms: lap.sector3_ms,
                delta_to_leader_ms: None,
                is_personal_best: lap.is_personal_best.unwrap_or(false),
            },
        )?;
        saved += 1;
    }

    if let Some((ms, driver_id)) = fastest {
        store.mark_fastest_lap(driver_id)?;
        debug!("Fastest lap {:.0} ms by driver {}", ms, driver_id);
    }
    info!("Saved {} lap timings", saved);
    Ok(())
}

fn save_deltas(store: &RaceStore, race_id: i64, total_laps: i64) -> Result<()> {
    let timings = store.lap_timings(race_id)?;
    let deltas = compute_deltas(&timings, total_laps);
    for (timing_id, delta) in &deltas {
        store.set_delta(*timing_id, *delta)?;
    }
    debug!("Assigned {} deltas", deltas.len());
    Ok(())
}

/// Lap records per stored driver id
fn group_laps<'a>(drivers: &DriverMap, laps: &'a [LapRecord]) -> BTreeMap<i64, Vec<&'a LapRecord>> {
    let mut grouped: BTreeMap<i64, Vec<&LapRecord>> = BTreeMap::new();
    for lap in laps.iter().filter(|l| l.lap_number.is_some()) {
        if let Some(driver) = lap.driver.as_ref().and_then(|abbr| drivers.get(abbr)) {
            grouped.entry(driver.id).or_default().push(lap);
        }
    }
    grouped
}

fn save_pit_stops(
    store: &RaceStore,
    race_id: i64,
    laps_by_driver: &BTreeMap<i64, Vec<&LapRecord>>,
) -> Result<()> {
    let mut total = 0;
    for (driver_id, laps) in laps_by_driver {
        let pit_laps: Vec<PitLap> = laps
            .iter()
            .map(|l| PitLap {
                lap_number: l.lap_number.unwrap_or(0),
                pit_in_ms: l.pit_in_ms,
                pit_out_ms: l.pit_out_ms,
            })
            .collect();
        for stop in detect_pit_stops(&pit_laps) {
            store.insert_pit_stop(race_id, *driver_id, &stop)?;
            total += 1;
        }
    }
    info!("Saved {} pit stops", total);
    Ok(())
}

fn save_stints(
    store: &RaceStore,
    race_id: i64,
    laps_by_driver: &BTreeMap<i64, Vec<&LapRecord>>,
) -> Result<()> {
    let mut total = 0;
    for (driver_id, laps) in laps_by_driver {
        let stint_laps: Vec<StintLap> = laps
            .iter()
            .map(|l| StintLap {
                lap_number: l.lap_number.unwrap_or(0),
                compound: l.compound.clone(),
                tyre_life: l.tyre_life,
                fresh_tyre: l.fresh_tyre,
            })
            .collect();
        for stint in derive_stints(&stint_laps) {
            store.insert_stint(race_id, *driver_id, &stint)?;
            total += 1;
        }
    }
    info!("Saved {} tyre stints", total);
    Ok(())
}

// ============================================
// TELEMETRY
// ============================================

fn save_telemetry(
    store: &RaceStore,
    race_id: i64,
    drivers: &DriverMap,
    session: &SessionData,
    laps_by_driver: &BTreeMap<i64, Vec<&LapRecord>>,
    total_laps: i64,
) -> Result<()> {
    let mut classified: Vec<&ResultRow> = session
        .results
        .iter()
        .filter(|r| r.position.is_some())
        .collect();
    classified.sort_by_key(|r| r.position);

    let top: HashMap<&str, i64> = classified
        .iter()
        .filter_map(|r| {
            let abbr = r.abbreviation.as_deref()?;
            drivers.get(abbr).map(|d| (abbr, d.id))
        })
        .take(TELEMETRY_DRIVERS)
        .collect();
    let wanted_laps = select_telemetry_laps(total_laps);

    let mut seen = HashSet::new();
    let mut saved = 0;
    for record in &session.telemetry {
        let (Some(abbr), Some(lap)) = (record.driver.as_deref(), record.lap_number) else {
            continue;
        };
        let Some(&driver_id) = top.get(abbr) else {
            continue;
        };
        if !wanted_laps.contains(&lap) || !seen.insert((driver_id, lap)) {
            continue;
        }
        // Only laps the driver actually completed in the timing data
        let driven = laps_by_driver
            .get(&driver_id)
            .is_some_and(|laps| laps.iter().any(|l| l.lap_number == Some(lap)));
        if !driven {
            debug!("Skipping telemetry for {} lap {}: no lap record", abbr, lap);
            continue;
        }

        match TelemetryTrace::from_raw(&record.data) {
            Some(trace) => {
                store.insert_telemetry(race_id, driver_id, lap, &trace)?;
                saved += 1;
            }
            None => debug!("Skipping telemetry for {} lap {}: incomplete series", abbr, lap),
        }
    }
    info!("Saved telemetry for {} laps", saved);
    Ok(())
}

// ============================================
// INCIDENTS
// ============================================

/// A status that is neither "Finished" nor a lapped classification ("+1 Lap")
fn is_retirement(status: &str) -> bool {
    !status.is_empty() && !status.contains("Finished") && !status.contains('+')
}

fn save_incidents(
    store: &RaceStore,
    race_id: i64,
    drivers: &DriverMap,
    session: &SessionData,
    laps_by_driver: &BTreeMap<i64, Vec<&LapRecord>>,
) -> Result<()> {
    let mut total = 0;

    for row in &session.results {
        let (Some(abbr), Some(status)) = (row.abbreviation.as_ref(), row.status.as_deref()) else {
            continue;
        };
        let Some(driver) = drivers.get(abbr) else {
            continue;
        };
        if !is_retirement(status) {
            continue;
        }

        let last_lap = laps_by_driver
            .get(&driver.id)
            .and_then(|laps| laps.iter().filter_map(|l| l.lap_number).max())
            .unwrap_or(0);
        store.insert_incident(
            race_id,
            &NewIncident {
                driver_id: Some(driver.id),
                lap_number: last_lap,
                incident_type: IncidentType::Dnf,
                description: format!("{} – {}", driver.full_name, status),
            },
        )?;
        total += 1;
    }

    let keys: Vec<DriverKey<'_>> = drivers
        .iter()
        .map(|(abbr, d)| DriverKey {
            id: d.id,
            abbreviation: abbr.as_str(),
            number: d.number,
        })
        .collect();

    for msg in &session.race_control_messages {
        let Some(text) = msg.message.as_deref() else {
            continue;
        };
        let incident_type = incident::classify(text);
        if incident_type == IncidentType::Other {
            continue;
        }

        store.insert_incident(
            race_id,
            &NewIncident {
                driver_id: incident::attribute_driver(text, msg.racing_number, &keys),
                lap_number: msg.lap.unwrap_or(0),
                incident_type,
                description: text.to_string(),
            },
        )?;
        total += 1;
    }

    if total == 0 {
        warn!("No incidents recorded for race {}", race_id);
    } else {
        info!("Saved {} incidents", total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(air: Option<f64>, rain: Option<bool>) -> WeatherSample {
        WeatherSample {
            air_temp: air,
            track_temp: None,
            rainfall: rain,
        }
    }

    #[test]
    fn test_weather_label() {
        assert_eq!(weather_label(&[]), "—");
        assert_eq!(weather_label(&[sample(None, Some(false))]), "Dry");
        assert_eq!(
            weather_label(&[sample(None, Some(false)), sample(None, Some(true))]),
            "Rain"
        );
    }

    #[test]
    fn test_mean_temp_rounds_and_skips_missing() {
        assert_eq!(mean_temp([Some(27.0), None, Some(28.4)].into_iter()), Some(27.7));
        assert_eq!(mean_temp([None, None].into_iter()), None);
    }

    #[test]
    fn test_team_color_normalization() {
        assert_eq!(normalize_team_color(Some("3671C6")), "#3671C6");
        assert_eq!(normalize_team_color(Some("#E80020")), "#E80020");
        assert_eq!(normalize_team_color(Some("  ")), "#ffffff");
        assert_eq!(normalize_team_color(None), "#ffffff");
    }

    #[test]
    fn test_retirement_status() {
        assert!(is_retirement("Engine"));
        assert!(is_retirement("Collision damage"));
        assert!(!is_retirement("Finished"));
        assert!(!is_retirement("+1 Lap"));
        assert!(!is_retirement(""));
    }
}
