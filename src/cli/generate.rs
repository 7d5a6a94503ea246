//! Generate command implementation
//!
//! Writes a synthetic race so the dashboard can be exercised without a
//! provider. Re-running overwrites the previous generated race.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::derive::{PitStopEvent, Stint};
use crate::model::{Compound, IncidentType, SafetyCar};
use crate::store::{NewDriver, NewIncident, NewLapTiming, NewRace, RaceProgress, RaceStore};

const YEAR: i64 = 2026;
const ROUND: i64 = 2;
const TOTAL_LAPS: i64 = 50;

/// (abbreviation, full name, number, team, colour)
const DRIVERS: [(&str, &str, i64, &str, &str); 10] = [
    ("VER", "Max Verstappen", 1, "Red Bull Racing", "#0600EF"),
    ("PER", "Sergio Perez", 11, "Red Bull Racing", "#0600EF"),
    ("HAM", "Lewis Hamilton", 44, "Mercedes", "#00D2BE"),
    ("RUS", "George Russell", 63, "Mercedes", "#00D2BE"),
    ("LEC", "Charles Leclerc", 16, "Ferrari", "#DC0000"),
    ("SAI", "Carlos Sainz", 55, "Ferrari", "#DC0000"),
    ("ALO", "Fernando Alonso", 14, "Aston Martin", "#006C42"),
    ("STR", "Lance Stroll", 18, "Aston Martin", "#006C42"),
    ("NOR", "Lando Norris", 4, "McLaren", "#FF8700"),
    ("PIA", "Oscar Piastri", 81, "McLaren", "#FF8700"),
];

const COMPOUNDS: [Compound; 3] = [Compound::Soft, Compound::Medium, Compound::Hard];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSummary {
    pub race_id: i64,
    pub current_lap: i64,
    pub drivers: usize,
    pub lap_timings: usize,
    pub pit_stops: usize,
    pub tyre_stints: usize,
    pub incidents: usize,
}

pub fn run(store: &RaceStore, laps: i64, seed: Option<u64>) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let summary = generate(store, laps, &mut rng)?;

    println!("Generated test race (ID {})", summary.race_id);
    println!("  Drivers:     {}", summary.drivers);
    println!("  Lap timings: {}", summary.lap_timings);
    println!("  Pit stops:   {}", summary.pit_stops);
    println!("  Tyre stints: {}", summary.tyre_stints);
    println!("  Incidents:   {}", summary.incidents);
    println!("  Running at lap {}", summary.current_lap);
    println!("\nStart the API with: paddock serve");
    Ok(())
}

/// Populate the synthetic race with `laps` laps of timing data
pub fn generate(store: &RaceStore, laps: i64, rng: &mut impl Rng) -> Result<GenerateSummary> {
    let laps = laps.max(1);

    let race_id = store.in_transaction(|store| {
        if let Some(existing) = store.find_race(YEAR, ROUND)? {
            store.delete_race(existing.id)?;
        }
        store.create_race(&NewRace {
            year: YEAR,
            round_number: ROUND,
            grand_prix: "Saudi Arabian GP".to_string(),
            country: "Saudi Arabia".to_string(),
            circuit_name: "Jeddah Corniche Circuit".to_string(),
            circuit_length_km: 6.174,
            total_laps: TOTAL_LAPS,
            weather: "Clear".to_string(),
            air_temp: Some(28.5),
            track_temp: Some(42.0),
            data_loaded: true,
        })
    })?;

    let mut summary = store.in_transaction(|store| populate(store, race_id, laps, rng))?;

    // save_progress opens its own transaction
    let current_lap = laps.min(20);
    store.save_progress(
        race_id,
        &RaceProgress {
            current_lap,
            is_running: true,
            is_finished: false,
            safety_car: SafetyCar::None,
        },
    )?;
    summary.current_lap = current_lap;
    Ok(summary)
}

fn populate(
    store: &RaceStore,
    race_id: i64,
    laps: i64,
    rng: &mut impl Rng,
) -> Result<GenerateSummary> {
    let mut driver_ids = Vec::with_capacity(DRIVERS.len());
    for (i, (abbr, name, number, team, color)) in DRIVERS.iter().enumerate() {
        let id = store.insert_driver(
            race_id,
            &NewDriver {
                abbreviation: abbr.to_string(),
                full_name: name.to_string(),
                number: *number,
                team: team.to_string(),
                team_color: color.to_string(),
                grid_position: i as i64 + 1,
                status: "Running".to_string(),
                is_fastest_lap: i == 0,
            },
        )?;
        driver_ids.push(id);
    }

    let mut lap_timings = 0;
    for lap in 1..=laps {
        for (pos, &driver_id) in driver_ids.iter().enumerate() {
            let pos = pos as i64;
            let lap_time = (95_000 + pos * 500 + rng.gen_range(-1000..=1000) + lap * 100) as f64;
            let s1 = (lap_time * 0.33).round();
            let s2 = (lap_time * 0.33).round();
            store.upsert_lap_timing(
                race_id,
                &NewLapTiming {
                    driver_id,
                    lap_number: lap,
                    position: pos + 1,
                    lap_time_ms: Some(lap_time),
                    sector1_ms: Some(s1),
                    sector2_ms: Some(s2),
                    sector3_ms: Some(lap_time - s1 - s2),
                    delta_to_leader_ms: Some((pos * 500) as f64),
                    is_personal_best: lap > 2 && rng.gen::<f64>() > 0.7,
                },
            )?;
            lap_timings += 1;
        }
    }

    // Pit window needs at least 4 laps either side
    let mut pit_stops = 0;
    if laps >= 9 {
        for &driver_id in driver_ids.iter().take(5) {
            store.insert_pit_stop(
                race_id,
                driver_id,
                &PitStopEvent {
                    stop_number: 1,
                    lap_number: rng.gen_range(4..=laps - 5),
                    duration_ms: Some(pit_stop_duration(rng)),
                },
            )?;
            pit_stops += 1;
        }
    }

    let mut tyre_stints = 0;
    for &driver_id in &driver_ids {
        for stint in stint_plan(laps, rng) {
            store.insert_stint(race_id, driver_id, &stint)?;
            tyre_stints += 1;
        }
    }

    let mut incidents = 0;
    let scripted = [
        (8, IncidentType::Sc, None, "Safety Car deployed - debris on track"),
        (15, IncidentType::Vsc, None, "Virtual Safety Car - minor incident Turn 2"),
        (18, IncidentType::Penalty, Some(driver_ids[3]), "5s penalty - unsafe release"),
    ];
    for (lap, incident_type, driver_id, description) in scripted {
        if lap > laps {
            continue;
        }
        let incident = NewIncident {
            driver_id,
            lap_number: lap,
            incident_type,
            description: description.to_string(),
        };
        if store.insert_incident_once(race_id, &incident)? {
            incidents += 1;
        }
    }

    Ok(GenerateSummary {
        race_id,
        current_lap: 0,
        drivers: driver_ids.len(),
        lap_timings,
        pit_stops,
        tyre_stints,
        incidents,
    })
}

/// Stationary time plus pit lane, in milliseconds
fn pit_stop_duration(rng: &mut impl Rng) -> f64 {
    rng.gen_range(20_000..=30_000_i64) as f64
}

/// Three contiguous stints splitting the race in thirds; the last one runs
/// to the flag. Races shorter than three laps get one stint per lap.
fn stint_plan(laps: i64, rng: &mut impl Rng) -> Vec<Stint> {
    let third = (laps / 3).max(1);
    let mut stints = Vec::new();
    for number in 1..=3_i64 {
        let start_lap = (number - 1) * third + 1;
        if start_lap > laps {
            break;
        }
        let end_lap = if number == 3 { laps } else { number * third };
        stints.push(Stint {
            stint_number: number,
            compound: COMPOUNDS[rng.gen_range(0..COMPOUNDS.len())],
            start_lap,
            end_lap: Some(end_lap),
            tyre_age: number * 10,
            is_new: number == 1,
        });
    }
    stints
}
