//! SQLite schema definition
//!
//! Every child table hangs off `races` with ON DELETE CASCADE, so removing a
//! race (e.g. `load --force`) drops everything that was loaded for it.
//! Natural keys carry UNIQUE constraints so the live poller can upsert.

pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- ============================================
-- RACES
-- ============================================

CREATE TABLE IF NOT EXISTS races (
    id INTEGER PRIMARY KEY,
    year INTEGER NOT NULL,
    round_number INTEGER NOT NULL,
    grand_prix TEXT NOT NULL,
    country TEXT NOT NULL DEFAULT '',
    circuit_name TEXT NOT NULL DEFAULT '',
    circuit_length_km REAL NOT NULL DEFAULT 0,
    total_laps INTEGER NOT NULL DEFAULT 0,
    current_lap INTEGER NOT NULL DEFAULT 0,   -- simulation cursor
    is_running BOOLEAN NOT NULL DEFAULT FALSE,
    is_finished BOOLEAN NOT NULL DEFAULT FALSE,
    weather TEXT NOT NULL DEFAULT '—',
    air_temp REAL,
    track_temp REAL,
    safety_car TEXT NOT NULL DEFAULT 'NONE',  -- 'NONE', 'SC', 'VSC', 'RED'
    data_loaded BOOLEAN NOT NULL DEFAULT FALSE,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(year, round_number)
);

-- ============================================
-- DRIVERS
-- ============================================

CREATE TABLE IF NOT EXISTS drivers (
    id INTEGER PRIMARY KEY,
    race_id INTEGER NOT NULL,
    abbreviation TEXT NOT NULL,               -- 'VER', 'HAM', ...
    full_name TEXT NOT NULL,
    number INTEGER NOT NULL DEFAULT 0,
    team TEXT NOT NULL DEFAULT '',
    team_color TEXT NOT NULL DEFAULT '#ffffff',
    grid_position INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'Running',   -- 'Running', 'Finished', '+1 Lap', 'Engine', ...
    is_fastest_lap BOOLEAN NOT NULL DEFAULT FALSE,
    UNIQUE(race_id, abbreviation),
    FOREIGN KEY(race_id) REFERENCES races(id) ON DELETE CASCADE
);

-- ============================================
-- TIMING
-- ============================================

CREATE TABLE IF NOT EXISTS lap_timings (
    id INTEGER PRIMARY KEY,
    race_id INTEGER NOT NULL,
    driver_id INTEGER NOT NULL,
    lap_number INTEGER NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    lap_time_ms REAL,                         -- NULL when not recorded
    sector1_ms REAL,
    sector2_ms REAL,
    sector3_ms REAL,
    delta_to_leader_ms REAL,
    is_personal_best BOOLEAN NOT NULL DEFAULT FALSE,
    UNIQUE(race_id, driver_id, lap_number),
    FOREIGN KEY(race_id) REFERENCES races(id) ON DELETE CASCADE,
    FOREIGN KEY(driver_id) REFERENCES drivers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS pit_stops (
    id INTEGER PRIMARY KEY,
    race_id INTEGER NOT NULL,
    driver_id INTEGER NOT NULL,
    lap_number INTEGER NOT NULL,
    stop_number INTEGER NOT NULL DEFAULT 1,
    duration_ms REAL,
    UNIQUE(race_id, driver_id, stop_number),
    FOREIGN KEY(race_id) REFERENCES races(id) ON DELETE CASCADE,
    FOREIGN KEY(driver_id) REFERENCES drivers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS tyre_stints (
    id INTEGER PRIMARY KEY,
    race_id INTEGER NOT NULL,
    driver_id INTEGER NOT NULL,
    stint_number INTEGER NOT NULL DEFAULT 1,
    compound TEXT NOT NULL DEFAULT 'UNKNOWN', -- 'SOFT', 'MEDIUM', 'HARD', 'INTERMEDIATE', 'WET', 'UNKNOWN'
    start_lap INTEGER NOT NULL,
    end_lap INTEGER,                          -- NULL while the stint is open
    tyre_age INTEGER NOT NULL DEFAULT 0,
    is_new BOOLEAN NOT NULL DEFAULT TRUE,
    UNIQUE(race_id, driver_id, stint_number),
    FOREIGN KEY(race_id) REFERENCES races(id) ON DELETE CASCADE,
    FOREIGN KEY(driver_id) REFERENCES drivers(id) ON DELETE CASCADE
);

-- ============================================
-- TELEMETRY
-- ============================================

-- Parallel JSON arrays, at most 200 samples per lap
CREATE TABLE IF NOT EXISTS telemetry (
    id INTEGER PRIMARY KEY,
    race_id INTEGER NOT NULL,
    driver_id INTEGER NOT NULL,
    lap_number INTEGER NOT NULL,
    distance TEXT NOT NULL,
    speed TEXT NOT NULL,
    throttle TEXT NOT NULL,
    brake TEXT NOT NULL,
    gear TEXT NOT NULL DEFAULT '[]',
    drs TEXT NOT NULL DEFAULT '[]',
    UNIQUE(race_id, driver_id, lap_number),
    FOREIGN KEY(race_id) REFERENCES races(id) ON DELETE CASCADE,
    FOREIGN KEY(driver_id) REFERENCES drivers(id) ON DELETE CASCADE
);

-- ============================================
-- INCIDENTS
-- ============================================

CREATE TABLE IF NOT EXISTS incidents (
    id INTEGER PRIMARY KEY,
    race_id INTEGER NOT NULL,
    driver_id INTEGER,                        -- NULL when not attributable
    lap_number INTEGER NOT NULL,
    incident_type TEXT NOT NULL,              -- 'SC', 'VSC', 'RED', 'PENALTY', 'DNF', 'OTHER'
    description TEXT NOT NULL DEFAULT '',
    FOREIGN KEY(race_id) REFERENCES races(id) ON DELETE CASCADE,
    FOREIGN KEY(driver_id) REFERENCES drivers(id) ON DELETE CASCADE
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_races_running ON races(is_running);
CREATE INDEX IF NOT EXISTS idx_lap_timings_lap ON lap_timings(race_id, lap_number, position);
CREATE INDEX IF NOT EXISTS idx_lap_timings_driver ON lap_timings(race_id, driver_id, lap_number);
CREATE INDEX IF NOT EXISTS idx_pit_stops_driver ON pit_stops(race_id, driver_id, lap_number);
CREATE INDEX IF NOT EXISTS idx_tyre_stints_driver ON tyre_stints(race_id, driver_id, stint_number);
CREATE INDEX IF NOT EXISTS idx_telemetry_driver ON telemetry(race_id, driver_id, lap_number);
CREATE INDEX IF NOT EXISTS idx_incidents_lap ON incidents(race_id, lap_number, incident_type);
"#;
