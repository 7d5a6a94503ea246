//! JSON payloads for the dashboard endpoints
//!
//! Every builder resolves the active race itself and answers
//! `{"status": "no_race"}` when there is none.

use anyhow::Result;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::format::{delta_str, lap_time_str, ms_to_seconds, sector_seconds};
use crate::model::Compound;
use crate::store::{DriverRow, LapTimingRow, RaceRow, RaceStore};

/// Drivers charted on the lap-time graph
const CHART_DRIVERS: usize = 5;

fn no_race(extra: Value) -> Value {
    let mut body = json!({ "status": "no_race" });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    body
}

/// GET /api/race/
pub fn race_payload(store: &RaceStore) -> Result<Value> {
    let Some(race) = store.active_race()? else {
        return Ok(no_race(json!({ "message": "No race loaded." })));
    };

    let mut fastest_lap = Value::Null;
    if let Some(driver) = store.fastest_lap_driver(race.id)? {
        if let Some(lap) = store.fastest_timed_lap(race.id, driver.id)? {
            fastest_lap = json!({
                "driver": driver.abbreviation,
                "time": lap_time_str(lap.lap_time_ms),
                "lap": lap.lap_number,
            });
        }
    }

    Ok(json!({
        "status": "ok",
        "race": {
            "id": race.id,
            "grand_prix": race.grand_prix,
            "country": race.country,
            "circuit": race.circuit_name,
            "circuit_length_km": race.circuit_length_km,
            "total_laps": race.total_laps,
            "current_lap": race.current_lap,
            "is_running": race.is_running,
            "is_finished": race.is_finished,
            "weather": race.weather,
            "air_temp": race.air_temp,
            "track_temp": race.track_temp,
            "safety_car": race.safety_car,
            "fastest_lap": fastest_lap,
        }
    }))
}

/// GET /api/ranking/
///
/// Ordered by position at the current lap. With no timings at that lap
/// (including lap 0) the grid order is shown instead.
pub fn ranking_payload(store: &RaceStore) -> Result<Value> {
    let Some(race) = store.active_race()? else {
        return Ok(no_race(json!({ "drivers": [] })));
    };
    let lap = race.current_lap;
    let timings = if lap >= 1 {
        store.timings_at_lap(race.id, lap)?
    } else {
        Vec::new()
    };

    let drivers = if timings.is_empty() {
        grid_ranking(store, &race)?
    } else {
        timed_ranking(store, &race, &timings)?
    };

    Ok(json!({
        "status": "ok",
        "current_lap": lap,
        "total_laps": race.total_laps,
        "drivers": drivers,
    }))
}

fn grid_ranking(store: &RaceStore, race: &RaceRow) -> Result<Vec<Value>> {
    let as_of = race.current_lap.max(1);
    let mut entries = Vec::new();
    for d in store.drivers(race.id)? {
        let stint = store.stint_at_lap(race.id, d.id, as_of)?;
        let pit_stops = store.pit_count(race.id, d.id, as_of)?;
        let (compound, tyre_age) = match &stint {
            Some(s) => (s.compound, s.tyre_age),
            None => (Compound::Unknown, 0),
        };

        let mut entry = driver_fields(&d);
        entry.extend(json_map(json!({
            "position": d.grid_position,
            "pos_change": 0,
            "lap_time": "—",
            "delta": "—",
            "delta_ms": null,
            "compound": compound.as_str(),
            "tyre_age": tyre_age,
            "pit_stops": pit_stops,
            "sector1": null,
            "sector2": null,
            "sector3": null,
        })));
        entries.push(Value::Object(entry));
    }
    Ok(entries)
}

fn timed_ranking(store: &RaceStore, race: &RaceRow, timings: &[LapTimingRow]) -> Result<Vec<Value>> {
    let lap = race.current_lap;
    let drivers: HashMap<i64, DriverRow> = store
        .drivers(race.id)?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();

    let mut entries = Vec::new();
    for t in timings {
        let Some(d) = drivers.get(&t.driver_id) else {
            continue;
        };
        let stint = store.stint_at_lap(race.id, d.id, lap)?;
        let pit_stops = store.pit_count(race.id, d.id, lap)?;
        let (compound, tyre_age) = match &stint {
            Some(s) => (s.compound, lap - s.start_lap + 1),
            None => (Compound::Unknown, 0),
        };

        let mut entry = driver_fields(d);
        entry.extend(json_map(json!({
            "position": t.position,
            "pos_change": d.grid_position - t.position,
            "lap_time": lap_time_str(t.lap_time_ms),
            "delta": delta_str(t.delta_to_leader_ms),
            "delta_ms": t.delta_to_leader_ms,
            "compound": compound.as_str(),
            "tyre_age": tyre_age,
            "pit_stops": pit_stops,
            "sector1": sector_seconds(t.sector1_ms),
            "sector2": sector_seconds(t.sector2_ms),
            "sector3": sector_seconds(t.sector3_ms),
        })));
        entries.push(Value::Object(entry));
    }
    Ok(entries)
}

fn driver_fields(d: &DriverRow) -> Map<String, Value> {
    json_map(json!({
        "abbreviation": d.abbreviation,
        "full_name": d.full_name,
        "number": d.number,
        "team": d.team,
        "team_color": d.team_color,
        "grid_position": d.grid_position,
        "status": d.status,
        "is_fastest_lap": d.is_fastest_lap,
    }))
}

fn json_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// GET /api/laptimes/
pub fn laptimes_payload(store: &RaceStore) -> Result<Value> {
    let Some(race) = store.active_race()? else {
        return Ok(no_race(json!({ "data": {} })));
    };
    let lap = race.current_lap;

    let drivers: HashMap<i64, DriverRow> = store
        .drivers(race.id)?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();

    let leaders: Vec<i64> = if lap >= 1 {
        store
            .timings_at_lap(race.id, lap)?
            .into_iter()
            .map(|t| t.driver_id)
            .take(CHART_DRIVERS)
            .collect()
    } else {
        Vec::new()
    };
    let charted: Vec<&DriverRow> = if leaders.is_empty() {
        let mut by_grid: Vec<&DriverRow> = drivers.values().collect();
        by_grid.sort_by_key(|d| (d.grid_position, d.id));
        by_grid.into_iter().take(CHART_DRIVERS).collect()
    } else {
        leaders.iter().filter_map(|id| drivers.get(id)).collect()
    };

    let mut data = Map::new();
    for d in charted {
        let laps = store.timed_laps(race.id, d.id, lap)?;
        data.insert(
            d.abbreviation.clone(),
            json!({
                "color": d.team_color,
                "laps": laps.iter().map(|t| t.lap_number).collect::<Vec<_>>(),
                "times": laps
                    .iter()
                    .filter_map(|t| t.lap_time_ms.map(ms_to_seconds))
                    .collect::<Vec<_>>(),
            }),
        );
    }

    Ok(json!({
        "status": "ok",
        "current_lap": lap,
        "data": data,
    }))
}

/// GET /api/telemetry/{abbreviation}/
pub fn telemetry_payload(store: &RaceStore, abbreviation: &str) -> Result<Value> {
    let Some(race) = store.active_race()? else {
        return Ok(no_race(json!({})));
    };
    let abbreviation = abbreviation.to_uppercase();
    let Some(driver) = store.find_driver(race.id, &abbreviation)? else {
        return Ok(json!({ "status": "error", "message": "Driver not found." }));
    };

    let Some((lap, trace)) = store.latest_telemetry(race.id, driver.id, race.current_lap)? else {
        return Ok(json!({
            "status": "ok",
            "driver": abbreviation,
            "lap": null,
            "telemetry": null,
        }));
    };

    Ok(json!({
        "status": "ok",
        "driver": abbreviation,
        "driver_name": driver.full_name,
        "team": driver.team,
        "team_color": driver.team_color,
        "lap": lap,
        "telemetry": trace,
    }))
}

/// GET /api/incidents/
pub fn incidents_payload(store: &RaceStore) -> Result<Value> {
    let Some(race) = store.active_race()? else {
        return Ok(no_race(json!({ "incidents": [] })));
    };

    let incidents: Vec<Value> = store
        .incidents(race.id, race.current_lap)?
        .into_iter()
        .map(|i| {
            json!({
                "lap": i.lap_number,
                "type": i.incident_type,
                "type_display": i.incident_type.display(),
                "driver": i.driver_abbreviation,
                "driver_name": i.driver_name,
                "description": i.description,
            })
        })
        .collect();

    Ok(json!({
        "status": "ok",
        "current_lap": race.current_lap,
        "incidents": incidents,
    }))
}

/// GET /api/drivers/
pub fn drivers_payload(store: &RaceStore) -> Result<Value> {
    let Some(race) = store.active_race()? else {
        return Ok(no_race(json!({ "drivers": [] })));
    };

    let mut drivers = Vec::new();
    for d in store.drivers(race.id)? {
        drivers.push(json!({
            "abbreviation": d.abbreviation,
            "full_name": d.full_name,
            "number": d.number,
            "team": d.team,
            "team_color": d.team_color,
            "has_telemetry": store.has_telemetry(race.id, d.id)?,
        }));
    }

    Ok(json!({ "status": "ok", "drivers": drivers }))
}
