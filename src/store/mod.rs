//! Race storage with SQLite
//!
//! `RaceStore` owns a single connection. All writers (loader, live poller,
//! simulator, test-data generator) and the read-only API go through it.

mod schema;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

use crate::derive::{PitStopEvent, Stint, TelemetryTrace};
use crate::model::{Compound, IncidentType, SafetyCar};

pub use schema::SCHEMA;

pub struct RaceStore {
    conn: Connection,
}

const RACE_COLUMNS: &str = "id, year, round_number, grand_prix, country, circuit_name,
    circuit_length_km, total_laps, current_lap, is_running, is_finished, weather,
    air_temp, track_temp, safety_car, data_loaded, created_at";

const DRIVER_COLUMNS: &str = "id, race_id, abbreviation, full_name, number, team,
    team_color, grid_position, status, is_fastest_lap";

const TIMING_COLUMNS: &str = "id, driver_id, lap_number, position, lap_time_ms,
    sector1_ms, sector2_ms, sector3_ms, delta_to_leader_ms, is_personal_best";

const STINT_COLUMNS: &str =
    "stint_number, compound, start_lap, end_lap, tyre_age, is_new";

impl RaceStore {
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an existing database without write access (API server)
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Run `f` inside a transaction; any error rolls everything back
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ============================================
    // RACES
    // ============================================

    pub fn create_race(&self, race: &NewRace) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO races (year, round_number, grand_prix, country, circuit_name,
                circuit_length_km, total_laps, weather, air_temp, track_temp, data_loaded)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                race.year,
                race.round_number,
                race.grand_prix,
                race.country,
                race.circuit_name,
                race.circuit_length_km,
                race.total_laps,
                race.weather,
                race.air_temp,
                race.track_temp,
                race.data_loaded,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert the race if (year, round) is new; returns its id and whether it was created
    pub fn get_or_create_race(&self, race: &NewRace) -> Result<(i64, bool)> {
        if let Some(existing) = self.find_race(race.year, race.round_number)? {
            return Ok((existing.id, false));
        }
        Ok((self.create_race(race)?, true))
    }

    pub fn find_race(&self, year: i64, round_number: i64) -> Result<Option<RaceRow>> {
        self.conn
            .query_row(
                &format!("SELECT {RACE_COLUMNS} FROM races WHERE year = ? AND round_number = ?"),
                params![year, round_number],
                map_race,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_race(&self, id: i64) -> Result<Option<RaceRow>> {
        self.conn
            .query_row(
                &format!("SELECT {RACE_COLUMNS} FROM races WHERE id = ?"),
                params![id],
                map_race,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Delete a race and, through cascades, everything loaded for it
    pub fn delete_race(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM races WHERE id = ?", params![id])?;
        Ok(())
    }

    pub fn set_data_loaded(&self, id: i64, loaded: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE races SET data_loaded = ? WHERE id = ?",
            params![loaded, id],
        )?;
        Ok(())
    }

    /// Persist the simulation-owned fields of a race.
    ///
    /// Setting `is_running` clears the flag on every other race in the same
    /// transaction, so at most one race is ever running.
    pub fn save_progress(&self, id: i64, progress: &RaceProgress) -> Result<()> {
        self.in_transaction(|store| {
            if progress.is_running {
                store.conn.execute(
                    "UPDATE races SET is_running = FALSE WHERE id != ? AND is_running",
                    params![id],
                )?;
            }
            store.conn.execute(
                "UPDATE races SET current_lap = ?, is_running = ?, is_finished = ?, safety_car = ?
                 WHERE id = ?",
                params![
                    progress.current_lap,
                    progress.is_running,
                    progress.is_finished,
                    progress.safety_car.as_str(),
                    id,
                ],
            )?;
            Ok(())
        })
    }

    /// Update only the running/finished flags (live poller)
    pub fn set_race_status(&self, id: i64, is_running: bool, is_finished: bool) -> Result<()> {
        self.in_transaction(|store| {
            if is_running {
                store.conn.execute(
                    "UPDATE races SET is_running = FALSE WHERE id != ? AND is_running",
                    params![id],
                )?;
            }
            store.conn.execute(
                "UPDATE races SET is_running = ?, is_finished = ? WHERE id = ?",
                params![is_running, is_finished, id],
            )?;
            Ok(())
        })
    }

    pub fn list_races(&self, year: Option<i64>, active_only: bool) -> Result<Vec<RaceRow>> {
        let mut query = format!("SELECT {RACE_COLUMNS} FROM races WHERE 1 = 1");
        if year.is_some() {
            query.push_str(" AND year = ?1");
        }
        if active_only {
            query.push_str(" AND is_running");
        }
        query.push_str(" ORDER BY year DESC, round_number DESC");

        let mut stmt = self.conn.prepare(&query)?;
        let rows = match year {
            Some(y) => stmt
                .query_map(params![y], map_race)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], map_race)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    /// The race the dashboard follows: the running race, else the most
    /// recently created race with data loaded.
    pub fn active_race(&self) -> Result<Option<RaceRow>> {
        let running = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RACE_COLUMNS} FROM races WHERE is_running ORDER BY id DESC LIMIT 1"
                ),
                [],
                map_race,
            )
            .optional()?;
        if running.is_some() {
            return Ok(running);
        }

        self.conn
            .query_row(
                &format!(
                    "SELECT {RACE_COLUMNS} FROM races WHERE data_loaded
                     ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                [],
                map_race,
            )
            .optional()
            .map_err(Into::into)
    }

    // ============================================
    // DRIVERS
    // ============================================

    pub fn insert_driver(&self, race_id: i64, driver: &NewDriver) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO drivers (race_id, abbreviation, full_name, number, team, team_color,
                grid_position, status, is_fastest_lap)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                race_id,
                driver.abbreviation,
                driver.full_name,
                driver.number,
                driver.team,
                driver.team_color,
                driver.grid_position,
                driver.status,
                driver.is_fastest_lap,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert the driver if new, otherwise refresh only its status
    pub fn upsert_driver(&self, race_id: i64, driver: &NewDriver) -> Result<i64> {
        let id = self.conn.query_row(
            "INSERT INTO drivers (race_id, abbreviation, full_name, number, team, team_color,
                grid_position, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(race_id, abbreviation) DO UPDATE SET status = excluded.status
             RETURNING id",
            params![
                race_id,
                driver.abbreviation,
                driver.full_name,
                driver.number,
                driver.team,
                driver.team_color,
                driver.grid_position,
                driver.status,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn drivers(&self, race_id: i64) -> Result<Vec<DriverRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DRIVER_COLUMNS} FROM drivers WHERE race_id = ?
             ORDER BY grid_position, id"
        ))?;
        let rows = stmt.query_map(params![race_id], map_driver)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn find_driver(&self, race_id: i64, abbreviation: &str) -> Result<Option<DriverRow>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {DRIVER_COLUMNS} FROM drivers WHERE race_id = ? AND abbreviation = ?"
                ),
                params![race_id, abbreviation],
                map_driver,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn mark_fastest_lap(&self, driver_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE drivers SET is_fastest_lap = TRUE WHERE id = ?",
            params![driver_id],
        )?;
        Ok(())
    }

    pub fn fastest_lap_driver(&self, race_id: i64) -> Result<Option<DriverRow>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {DRIVER_COLUMNS} FROM drivers WHERE race_id = ? AND is_fastest_lap
                     ORDER BY id LIMIT 1"
                ),
                params![race_id],
                map_driver,
            )
            .optional()
            .map_err(Into::into)
    }

    // ============================================
    // LAP TIMINGS
    // ============================================

    /// Insert a timing row; a duplicate (race, driver, lap) is ignored
    pub fn insert_lap_timing(&self, race_id: i64, timing: &NewLapTiming) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO lap_timings (race_id, driver_id, lap_number, position,
                lap_time_ms, sector1_ms, sector2_ms, sector3_ms, delta_to_leader_ms,
                is_personal_best)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                race_id,
                timing.driver_id,
                timing.lap_number,
                timing.position,
                timing.lap_time_ms,
                timing.sector1_ms,
                timing.sector2_ms,
                timing.sector3_ms,
                timing.delta_to_leader_ms,
                timing.is_personal_best,
            ],
        )?;
        Ok(())
    }

    /// Insert or refresh a timing row keyed by (race, driver, lap).
    /// A `None` delta keeps whatever delta is already stored.
    pub fn upsert_lap_timing(&self, race_id: i64, timing: &NewLapTiming) -> Result<()> {
        self.conn.execute(
            "INSERT INTO lap_timings (race_id, driver_id, lap_number, position, lap_time_ms,
                sector1_ms, sector2_ms, sector3_ms, delta_to_leader_ms, is_personal_best)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(race_id, driver_id, lap_number) DO UPDATE SET
                 position = excluded.position,
                 lap_time_ms = excluded.lap_time_ms,
                 sector1_ms = excluded.sector1_ms,
                 sector2_ms = excluded.sector2_ms,
                 sector3_ms = excluded.sector3_ms,
                 delta_to_leader_ms = COALESCE(excluded.delta_to_leader_ms, delta_to_leader_ms),
                 is_personal_best = excluded.is_personal_best",
            params![
                race_id,
                timing.driver_id,
                timing.lap_number,
                timing.position,
                timing.lap_time_ms,
                timing.sector1_ms,
                timing.sector2_ms,
                timing.sector3_ms,
                timing.delta_to_leader_ms,
                timing.is_personal_best,
            ],
        )?;
        Ok(())
    }

    pub fn lap_timings(&self, race_id: i64) -> Result<Vec<LapTimingRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TIMING_COLUMNS} FROM lap_timings WHERE race_id = ?
             ORDER BY lap_number, position"
        ))?;
        let rows = stmt.query_map(params![race_id], map_timing)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn timings_at_lap(&self, race_id: i64, lap_number: i64) -> Result<Vec<LapTimingRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TIMING_COLUMNS} FROM lap_timings WHERE race_id = ? AND lap_number = ?
             ORDER BY position, id"
        ))?;
        let rows = stmt.query_map(params![race_id, lap_number], map_timing)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// A driver's recorded lap times up to and including `up_to_lap`
    pub fn timed_laps(&self, race_id: i64, driver_id: i64, up_to_lap: i64) -> Result<Vec<LapTimingRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TIMING_COLUMNS} FROM lap_timings
             WHERE race_id = ? AND driver_id = ? AND lap_number <= ? AND lap_time_ms IS NOT NULL
             ORDER BY lap_number"
        ))?;
        let rows = stmt.query_map(params![race_id, driver_id, up_to_lap], map_timing)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn fastest_timed_lap(&self, race_id: i64, driver_id: i64) -> Result<Option<LapTimingRow>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {TIMING_COLUMNS} FROM lap_timings
                     WHERE race_id = ? AND driver_id = ? AND lap_time_ms IS NOT NULL
                     ORDER BY lap_time_ms, lap_number LIMIT 1"
                ),
                params![race_id, driver_id],
                map_timing,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn set_delta(&self, timing_id: i64, delta_ms: Option<f64>) -> Result<()> {
        self.conn.execute(
            "UPDATE lap_timings SET delta_to_leader_ms = ? WHERE id = ?",
            params![delta_ms, timing_id],
        )?;
        Ok(())
    }

    // ============================================
    // PIT STOPS & STINTS
    // ============================================

    pub fn insert_pit_stop(&self, race_id: i64, driver_id: i64, stop: &PitStopEvent) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pit_stops (race_id, driver_id, lap_number, stop_number, duration_ms)
             VALUES (?, ?, ?, ?, ?)",
            params![race_id, driver_id, stop.lap_number, stop.stop_number, stop.duration_ms],
        )?;
        Ok(())
    }

    pub fn pit_count(&self, race_id: i64, driver_id: i64, up_to_lap: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM pit_stops WHERE race_id = ? AND driver_id = ? AND lap_number <= ?",
            params![race_id, driver_id, up_to_lap],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn insert_stint(&self, race_id: i64, driver_id: i64, stint: &Stint) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO tyre_stints (race_id, driver_id, stint_number, compound,
                start_lap, end_lap, tyre_age, is_new)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                race_id,
                driver_id,
                stint.stint_number,
                stint.compound.as_str(),
                stint.start_lap,
                stint.end_lap,
                stint.tyre_age,
                stint.is_new,
            ],
        )?;
        Ok(())
    }

    pub fn stints(&self, race_id: i64, driver_id: i64) -> Result<Vec<Stint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STINT_COLUMNS} FROM tyre_stints WHERE race_id = ? AND driver_id = ?
             ORDER BY stint_number"
        ))?;
        let rows = stmt.query_map(params![race_id, driver_id], map_stint)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The stint covering `lap`, else the latest stint started by then
    pub fn stint_at_lap(&self, race_id: i64, driver_id: i64, lap: i64) -> Result<Option<Stint>> {
        let covering = self
            .conn
            .query_row(
                &format!(
                    "SELECT {STINT_COLUMNS} FROM tyre_stints
                     WHERE race_id = ?1 AND driver_id = ?2 AND start_lap <= ?3
                       AND (end_lap IS NULL OR end_lap >= ?3)
                     ORDER BY stint_number LIMIT 1"
                ),
                params![race_id, driver_id, lap],
                map_stint,
            )
            .optional()?;
        if covering.is_some() {
            return Ok(covering);
        }

        self.conn
            .query_row(
                &format!(
                    "SELECT {STINT_COLUMNS} FROM tyre_stints
                     WHERE race_id = ? AND driver_id = ? AND start_lap <= ?
                     ORDER BY stint_number DESC LIMIT 1"
                ),
                params![race_id, driver_id, lap],
                map_stint,
            )
            .optional()
            .map_err(Into::into)
    }

    // ============================================
    // TELEMETRY
    // ============================================

    pub fn insert_telemetry(
        &self,
        race_id: i64,
        driver_id: i64,
        lap_number: i64,
        trace: &TelemetryTrace,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO telemetry (race_id, driver_id, lap_number, distance, speed,
                throttle, brake, gear, drs)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                race_id,
                driver_id,
                lap_number,
                serde_json::to_string(&trace.distance)?,
                serde_json::to_string(&trace.speed)?,
                serde_json::to_string(&trace.throttle)?,
                serde_json::to_string(&trace.brake)?,
                serde_json::to_string(&trace.gear)?,
                serde_json::to_string(&trace.drs)?,
            ],
        )?;
        Ok(())
    }

    /// Most recent stored telemetry at or before `up_to_lap`
    pub fn latest_telemetry(
        &self,
        race_id: i64,
        driver_id: i64,
        up_to_lap: i64,
    ) -> Result<Option<(i64, TelemetryTrace)>> {
        let row = self
            .conn
            .query_row(
                "SELECT lap_number, distance, speed, throttle, brake, gear, drs FROM telemetry
                 WHERE race_id = ? AND driver_id = ? AND lap_number <= ?
                 ORDER BY lap_number DESC LIMIT 1",
                params![race_id, driver_id, up_to_lap],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        [
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                        ],
                    ))
                },
            )
            .optional()?;

        let Some((lap, [distance, speed, throttle, brake, gear, drs])) = row else {
            return Ok(None);
        };

        let trace = TelemetryTrace {
            distance: serde_json::from_str(&distance)?,
            speed: serde_json::from_str(&speed)?,
            throttle: serde_json::from_str(&throttle)?,
            brake: serde_json::from_str(&brake)?,
            gear: serde_json::from_str(&gear)?,
            drs: serde_json::from_str(&drs)?,
        };
        Ok(Some((lap, trace)))
    }

    pub fn has_telemetry(&self, race_id: i64, driver_id: i64) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM telemetry WHERE race_id = ? AND driver_id = ?)",
            params![race_id, driver_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // ============================================
    // INCIDENTS
    // ============================================

    pub fn insert_incident(&self, race_id: i64, incident: &NewIncident) -> Result<()> {
        self.conn.execute(
            "INSERT INTO incidents (race_id, driver_id, lap_number, incident_type, description)
             VALUES (?, ?, ?, ?, ?)",
            params![
                race_id,
                incident.driver_id,
                incident.lap_number,
                incident.incident_type.as_str(),
                incident.description,
            ],
        )?;
        Ok(())
    }

    /// Insert unless an incident of the same type already exists on that lap.
    /// Returns whether a row was written.
    pub fn insert_incident_once(&self, race_id: i64, incident: &NewIncident) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO incidents (race_id, driver_id, lap_number, incident_type, description)
             SELECT ?1, ?2, ?3, ?4, ?5
             WHERE NOT EXISTS (
                 SELECT 1 FROM incidents
                 WHERE race_id = ?1 AND lap_number = ?3 AND incident_type = ?4
             )",
            params![
                race_id,
                incident.driver_id,
                incident.lap_number,
                incident.incident_type.as_str(),
                incident.description,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Incidents up to `up_to_lap`, newest lap first
    pub fn incidents(&self, race_id: i64, up_to_lap: i64) -> Result<Vec<IncidentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.lap_number, i.incident_type, i.description, d.abbreviation, d.full_name
             FROM incidents i
             LEFT JOIN drivers d ON i.driver_id = d.id
             WHERE i.race_id = ? AND i.lap_number <= ?
             ORDER BY i.lap_number DESC, i.id",
        )?;
        let rows = stmt.query_map(params![race_id, up_to_lap], |row| {
            Ok(IncidentRow {
                lap_number: row.get(0)?,
                incident_type: IncidentType::parse(&row.get::<_, String>(1)?),
                description: row.get(2)?,
                driver_abbreviation: row.get(3)?,
                driver_name: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct laps carrying an incident of the given type
    pub fn incident_laps(&self, race_id: i64, incident_type: IncidentType) -> Result<BTreeSet<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT lap_number FROM incidents WHERE race_id = ? AND incident_type = ?",
        )?;
        let rows = stmt.query_map(params![race_id, incident_type.as_str()], |row| row.get(0))?;
        rows.collect::<Result<BTreeSet<_>, _>>().map_err(Into::into)
    }

    pub fn count_rows(&self, table: RaceTable, race_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE race_id = ?", table.as_str()),
            params![race_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ============================================
// ROW MAPPERS
// ============================================

fn map_race(row: &Row) -> rusqlite::Result<RaceRow> {
    Ok(RaceRow {
        id: row.get(0)?,
        year: row.get(1)?,
        round_number: row.get(2)?,
        grand_prix: row.get(3)?,
        country: row.get(4)?,
        circuit_name: row.get(5)?,
        circuit_length_km: row.get(6)?,
        total_laps: row.get(7)?,
        current_lap: row.get(8)?,
        is_running: row.get(9)?,
        is_finished: row.get(10)?,
        weather: row.get(11)?,
        air_temp: row.get(12)?,
        track_temp: row.get(13)?,
        safety_car: SafetyCar::parse(&row.get::<_, String>(14)?),
        data_loaded: row.get(15)?,
        created_at: row.get(16)?,
    })
}

fn map_driver(row: &Row) -> rusqlite::Result<DriverRow> {
    Ok(DriverRow {
        id: row.get(0)?,
        race_id: row.get(1)?,
        abbreviation: row.get(2)?,
        full_name: row.get(3)?,
        number: row.get(4)?,
        team: row.get(5)?,
        team_color: row.get(6)?,
        grid_position: row.get(7)?,
        status: row.get(8)?,
        is_fastest_lap: row.get(9)?,
    })
}

fn map_timing(row: &Row) -> rusqlite::Result<LapTimingRow> {
    Ok(LapTimingRow {
        id: row.get(0)?,
        driver_id: row.get(1)?,
        lap_number: row.get(2)?,
        position: row.get(3)?,
        lap_time_ms: row.get(4)?,
        sector1_ms: row.get(5)?,
        sector2_ms: row.get(6)?,
        sector3_ms: row.get(7)?,
        delta_to_leader_ms: row.get(8)?,
        is_personal_best: row.get(9)?,
    })
}

fn map_stint(row: &Row) -> rusqlite::Result<Stint> {
    Ok(Stint {
        stint_number: row.get(0)?,
        compound: Compound::normalize(&row.get::<_, String>(1)?),
        start_lap: row.get(2)?,
        end_lap: row.get(3)?,
        tyre_age: row.get(4)?,
        is_new: row.get(5)?,
    })
}

// ============================================
// INPUT & ROW TYPES
// ============================================

/// Child tables keyed by race, for row counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceTable {
    Drivers,
    LapTimings,
    PitStops,
    TyreStints,
    Telemetry,
    Incidents,
}

impl RaceTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceTable::Drivers => "drivers",
            RaceTable::LapTimings => "lap_timings",
            RaceTable::PitStops => "pit_stops",
            RaceTable::TyreStints => "tyre_stints",
            RaceTable::Telemetry => "telemetry",
            RaceTable::Incidents => "incidents",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRace {
    pub year: i64,
    pub round_number: i64,
    pub grand_prix: String,
    pub country: String,
    pub circuit_name: String,
    pub circuit_length_km: f64,
    pub total_laps: i64,
    pub weather: String,
    pub air_temp: Option<f64>,
    pub track_temp: Option<f64>,
    pub data_loaded: bool,
}

#[derive(Debug, Clone)]
pub struct NewDriver {
    pub abbreviation: String,
    pub full_name: String,
    pub number: i64,
    pub team: String,
    pub team_color: String,
    pub grid_position: i64,
    pub status: String,
    pub is_fastest_lap: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewLapTiming {
    pub driver_id: i64,
    pub lap_number: i64,
    pub position: i64,
    pub lap_time_ms: Option<f64>,
    pub sector1_ms: Option<f64>,
    pub sector2_ms: Option<f64>,
    pub sector3_ms: Option<f64>,
    pub delta_to_leader_ms: Option<f64>,
    pub is_personal_best: bool,
}

#[derive(Debug, Clone)]
pub struct NewIncident {
    pub driver_id: Option<i64>,
    pub lap_number: i64,
    pub incident_type: IncidentType,
    pub description: String,
}

/// Simulation-owned race fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceProgress {
    pub current_lap: i64,
    pub is_running: bool,
    pub is_finished: bool,
    pub safety_car: SafetyCar,
}

#[derive(Debug, Clone)]
pub struct RaceRow {
    pub id: i64,
    pub year: i64,
    pub round_number: i64,
    pub grand_prix: String,
    pub country: String,
    pub circuit_name: String,
    pub circuit_length_km: f64,
    pub total_laps: i64,
    pub current_lap: i64,
    pub is_running: bool,
    pub is_finished: bool,
    pub weather: String,
    pub air_temp: Option<f64>,
    pub track_temp: Option<f64>,
    pub safety_car: SafetyCar,
    pub data_loaded: bool,
    pub created_at: String,
}

impl RaceRow {
    pub fn progress(&self) -> RaceProgress {
        RaceProgress {
            current_lap: self.current_lap,
            is_running: self.is_running,
            is_finished: self.is_finished,
            safety_car: self.safety_car,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriverRow {
    pub id: i64,
    pub race_id: i64,
    pub abbreviation: String,
    pub full_name: String,
    pub number: i64,
    pub team: String,
    pub team_color: String,
    pub grid_position: i64,
    pub status: String,
    pub is_fastest_lap: bool,
}

#[derive(Debug, Clone)]
pub struct LapTimingRow {
    pub id: i64,
    pub driver_id: i64,
    pub lap_number: i64,
    pub position: i64,
    pub lap_time_ms: Option<f64>,
    pub sector1_ms: Option<f64>,
    pub sector2_ms: Option<f64>,
    pub sector3_ms: Option<f64>,
    pub delta_to_leader_ms: Option<f64>,
    pub is_personal_best: bool,
}

#[derive(Debug, Clone)]
pub struct IncidentRow {
    pub lap_number: i64,
    pub incident_type: IncidentType,
    pub description: String,
    pub driver_abbreviation: Option<String>,
    pub driver_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_race(year: i64, round: i64) -> NewRace {
        NewRace {
            year,
            round_number: round,
            grand_prix: "Bahrain Grand Prix".to_string(),
            country: "Bahrain".to_string(),
            circuit_name: "Sakhir".to_string(),
            circuit_length_km: 0.0,
            total_laps: 57,
            weather: "—".to_string(),
            air_temp: None,
            track_temp: None,
            data_loaded: true,
        }
    }

    fn sample_driver(abbr: &str, grid: i64) -> NewDriver {
        NewDriver {
            abbreviation: abbr.to_string(),
            full_name: abbr.to_string(),
            number: grid,
            team: "Team".to_string(),
            team_color: "#ffffff".to_string(),
            grid_position: grid,
            status: "Running".to_string(),
            is_fastest_lap: false,
        }
    }

    fn running(lap: i64) -> RaceProgress {
        RaceProgress {
            current_lap: lap,
            is_running: true,
            is_finished: false,
            safety_car: SafetyCar::None,
        }
    }

    #[test]
    fn test_at_most_one_running_race() {
        let store = RaceStore::open_in_memory().unwrap();
        let a = store.create_race(&sample_race(2024, 1)).unwrap();
        let b = store.create_race(&sample_race(2024, 2)).unwrap();

        store.save_progress(a, &running(3)).unwrap();
        store.save_progress(b, &running(1)).unwrap();

        let running: Vec<_> = store.list_races(None, true).unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, b);
        assert_eq!(store.get_race(a).unwrap().unwrap().current_lap, 3);

        store.set_race_status(a, true, false).unwrap();
        assert_eq!(store.active_race().unwrap().unwrap().id, a);
        assert!(!store.get_race(b).unwrap().unwrap().is_running);
    }

    #[test]
    fn test_active_race_falls_back_to_latest_loaded() {
        let store = RaceStore::open_in_memory().unwrap();
        assert!(store.active_race().unwrap().is_none());

        let first = store.create_race(&sample_race(2023, 1)).unwrap();
        let second = store.create_race(&sample_race(2023, 2)).unwrap();
        let mut unloaded = sample_race(2023, 3);
        unloaded.data_loaded = false;
        store.create_race(&unloaded).unwrap();

        assert_eq!(store.active_race().unwrap().unwrap().id, second);
        store.set_data_loaded(second, false).unwrap();
        assert_eq!(store.active_race().unwrap().unwrap().id, first);
    }

    #[test]
    fn test_delete_race_cascades() {
        let store = RaceStore::open_in_memory().unwrap();
        let race = store.create_race(&sample_race(2024, 1)).unwrap();
        let driver = store.insert_driver(race, &sample_driver("VER", 1)).unwrap();
        store
            .insert_lap_timing(
                race,
                &NewLapTiming {
                    driver_id: driver,
                    lap_number: 1,
                    position: 1,
                    lap_time_ms: Some(95_000.0),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .insert_incident(
                race,
                &NewIncident {
                    driver_id: Some(driver),
                    lap_number: 1,
                    incident_type: IncidentType::Penalty,
                    description: "5s".to_string(),
                },
            )
            .unwrap();

        store.delete_race(race).unwrap();
        assert_eq!(store.count_rows(RaceTable::Drivers, race).unwrap(), 0);
        assert_eq!(store.count_rows(RaceTable::LapTimings, race).unwrap(), 0);
        assert_eq!(store.count_rows(RaceTable::Incidents, race).unwrap(), 0);
    }

    #[test]
    fn test_upsert_driver_refreshes_status_only() {
        let store = RaceStore::open_in_memory().unwrap();
        let race = store.create_race(&sample_race(2024, 1)).unwrap();
        let id = store.upsert_driver(race, &sample_driver("HAM", 3)).unwrap();

        let mut again = sample_driver("HAM", 9);
        again.status = "Retired".to_string();
        assert_eq!(store.upsert_driver(race, &again).unwrap(), id);

        let row = store.find_driver(race, "HAM").unwrap().unwrap();
        assert_eq!(row.status, "Retired");
        assert_eq!(row.grid_position, 3);
    }

    #[test]
    fn test_incident_once_dedups_on_lap_and_type() {
        let store = RaceStore::open_in_memory().unwrap();
        let race = store.create_race(&sample_race(2024, 1)).unwrap();
        let incident = |text: &str| NewIncident {
            driver_id: None,
            lap_number: 12,
            incident_type: IncidentType::Sc,
            description: text.to_string(),
        };

        assert!(store.insert_incident_once(race, &incident("SAFETY CAR DEPLOYED")).unwrap());
        assert!(!store.insert_incident_once(race, &incident("SAFETY CAR IN THIS LAP")).unwrap());
        assert_eq!(store.incidents(race, 99).unwrap().len(), 1);
        assert_eq!(
            store.incident_laps(race, IncidentType::Sc).unwrap(),
            BTreeSet::from([12])
        );
    }

    #[test]
    fn test_stint_at_lap_prefers_covering_stint() {
        let store = RaceStore::open_in_memory().unwrap();
        let race = store.create_race(&sample_race(2024, 1)).unwrap();
        let driver = store.insert_driver(race, &sample_driver("LEC", 2)).unwrap();
        for stint in [
            Stint {
                stint_number: 1,
                compound: Compound::Medium,
                start_lap: 1,
                end_lap: Some(20),
                tyre_age: 20,
                is_new: true,
            },
            Stint {
                stint_number: 2,
                compound: Compound::Hard,
                start_lap: 21,
                end_lap: Some(57),
                tyre_age: 37,
                is_new: true,
            },
        ] {
            store.insert_stint(race, driver, &stint).unwrap();
        }

        assert_eq!(
            store.stint_at_lap(race, driver, 20).unwrap().unwrap().compound,
            Compound::Medium
        );
        assert_eq!(
            store.stint_at_lap(race, driver, 21).unwrap().unwrap().compound,
            Compound::Hard
        );
        // Past the last recorded lap: latest started stint
        assert_eq!(
            store.stint_at_lap(race, driver, 60).unwrap().unwrap().stint_number,
            2
        );
        assert!(store.stint_at_lap(race, driver, 0).unwrap().is_none());
    }
}
