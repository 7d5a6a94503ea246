//! Race-data providers for the batch loader
//!
//! A provider hands back one completed race session as a [`SessionData`].
//! The document layout follows the column names of the public timing
//! exports (`Abbreviation`, `LapNumber`, `PitInTime`, ...). Times are in
//! milliseconds. Only the top-level shape is strict; every row is decoded on
//! its own and rows that do not decode are dropped with a debug log.

mod archive;
mod error;
mod file;
pub(crate) mod lenient;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::derive::RawTelemetry;

pub use archive::ArchiveSource;
pub use error::ProviderError;
pub use file::FileSource;

/// Trait for sources of completed race sessions.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Short description for log lines, e.g. the URL or file path
    fn describe(&self) -> String;

    async fn fetch_session(&self, year: i64, round: i64) -> Result<SessionData, ProviderError>;
}

/// One race session, decoded row by row
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub event: EventInfo,
    pub results: Vec<ResultRow>,
    pub laps: Vec<LapRecord>,
    pub telemetry: Vec<TelemetryRecord>,
    pub weather: Vec<WeatherSample>,
    pub race_control_messages: Vec<RaceControlMessage>,
}

/// Sections may be absent or `null`; both read as empty
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    event: Option<Value>,
    #[serde(default)]
    results: Option<Vec<Value>>,
    #[serde(default)]
    laps: Option<Vec<Value>>,
    #[serde(default)]
    telemetry: Option<Vec<Value>>,
    #[serde(default)]
    weather: Option<Vec<Value>>,
    #[serde(default)]
    race_control_messages: Option<Vec<Value>>,
}

impl SessionData {
    /// Decode a session document; fails only when the top level is unreadable
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProviderError> {
        let raw: RawDocument = serde_json::from_slice(bytes)?;
        let event = raw
            .event
            .map(|v| {
                serde_json::from_value::<EventInfo>(v).unwrap_or_else(|e| {
                    debug!("Skipping malformed event metadata: {}", e);
                    EventInfo::default()
                })
            })
            .unwrap_or_default();

        Ok(Self {
            event,
            results: parse_rows("results", raw.results.unwrap_or_default()),
            laps: parse_rows("laps", raw.laps.unwrap_or_default()),
            telemetry: parse_rows("telemetry", raw.telemetry.unwrap_or_default()),
            weather: parse_rows("weather", raw.weather.unwrap_or_default()),
            race_control_messages: parse_rows(
                "race_control_messages",
                raw.race_control_messages.unwrap_or_default(),
            ),
        })
    }
}

/// Decode each row independently, dropping the ones that fail
fn parse_rows<T: DeserializeOwned>(section: &str, rows: Vec<Value>) -> Vec<T> {
    let total = rows.len();
    let parsed: Vec<T> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(i, row)| match serde_json::from_value(row) {
            Ok(r) => Some(r),
            Err(e) => {
                debug!("Skipping {} row {}: {}", section, i, e);
                None
            }
        })
        .collect();
    if parsed.len() < total {
        debug!("{}: kept {} of {} rows", section, parsed.len(), total);
    }
    parsed
}

// ============================================
// DOCUMENT ROWS
// ============================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventInfo {
    #[serde(rename = "EventName", default, deserialize_with = "lenient::text")]
    pub event_name: Option<String>,
    #[serde(rename = "Country", default, deserialize_with = "lenient::text")]
    pub country: Option<String>,
    #[serde(rename = "Location", default, deserialize_with = "lenient::text")]
    pub location: Option<String>,
    #[serde(rename = "CircuitLength", default, deserialize_with = "lenient::number")]
    pub circuit_length_km: Option<f64>,
}

/// Classification row, one per entrant
#[derive(Debug, Clone, Deserialize)]
pub struct ResultRow {
    #[serde(rename = "Abbreviation", default, deserialize_with = "lenient::text")]
    pub abbreviation: Option<String>,
    #[serde(rename = "FullName", default, deserialize_with = "lenient::text")]
    pub full_name: Option<String>,
    #[serde(rename = "DriverNumber", default, deserialize_with = "lenient::integer")]
    pub driver_number: Option<i64>,
    #[serde(rename = "TeamName", default, deserialize_with = "lenient::text")]
    pub team_name: Option<String>,
    #[serde(rename = "TeamColor", default, deserialize_with = "lenient::text")]
    pub team_color: Option<String>,
    #[serde(rename = "GridPosition", default, deserialize_with = "lenient::integer")]
    pub grid_position: Option<i64>,
    #[serde(rename = "Position", default, deserialize_with = "lenient::integer")]
    pub position: Option<i64>,
    #[serde(rename = "Status", default, deserialize_with = "lenient::text")]
    pub status: Option<String>,
}

/// One driver-lap
#[derive(Debug, Clone, Deserialize)]
pub struct LapRecord {
    #[serde(rename = "Driver", default, deserialize_with = "lenient::text")]
    pub driver: Option<String>,
    #[serde(rename = "LapNumber", default, deserialize_with = "lenient::integer")]
    pub lap_number: Option<i64>,
    #[serde(rename = "LapTime", default, deserialize_with = "lenient::number")]
    pub lap_time_ms: Option<f64>,
    #[serde(rename = "Sector1Time", default, deserialize_with = "lenient::number")]
    pub sector1_ms: Option<f64>,
    #[serde(rename = "Sector2Time", default, deserialize_with = "lenient::number")]
    pub sector2_ms: Option<f64>,
    #[serde(rename = "Sector3Time", default, deserialize_with = "lenient::number")]
    pub sector3_ms: Option<f64>,
    #[serde(rename = "Position", default, deserialize_with = "lenient::integer")]
    pub position: Option<i64>,
    #[serde(rename = "IsPersonalBest", default, deserialize_with = "lenient::boolean")]
    pub is_personal_best: Option<bool>,
    #[serde(rename = "Compound", default, deserialize_with = "lenient::text")]
    pub compound: Option<String>,
    #[serde(rename = "TyreLife", default, deserialize_with = "lenient::number")]
    pub tyre_life: Option<f64>,
    #[serde(rename = "FreshTyre", default, deserialize_with = "lenient::boolean")]
    pub fresh_tyre: Option<bool>,
    #[serde(rename = "PitInTime", default, deserialize_with = "lenient::number")]
    pub pit_in_ms: Option<f64>,
    #[serde(rename = "PitOutTime", default, deserialize_with = "lenient::number")]
    pub pit_out_ms: Option<f64>,
}

/// Car data for one driver-lap
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "Driver", default, deserialize_with = "lenient::text")]
    pub driver: Option<String>,
    #[serde(rename = "LapNumber", default, deserialize_with = "lenient::integer")]
    pub lap_number: Option<i64>,
    #[serde(flatten)]
    pub data: RawTelemetry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherSample {
    #[serde(rename = "AirTemp", default, deserialize_with = "lenient::number")]
    pub air_temp: Option<f64>,
    #[serde(rename = "TrackTemp", default, deserialize_with = "lenient::number")]
    pub track_temp: Option<f64>,
    #[serde(rename = "Rainfall", default, deserialize_with = "lenient::boolean")]
    pub rainfall: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceControlMessage {
    #[serde(rename = "Message", default, deserialize_with = "lenient::text")]
    pub message: Option<String>,
    #[serde(rename = "Lap", default, deserialize_with = "lenient::integer")]
    pub lap: Option<i64>,
    #[serde(rename = "RacingNumber", default, deserialize_with = "lenient::integer")]
    pub racing_number: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bad_rows_are_dropped_not_fatal() {
        let doc = json!({
            "event": {"EventName": "Bahrain Grand Prix", "Country": "Bahrain"},
            "results": [
                {"Abbreviation": "VER", "DriverNumber": "1", "GridPosition": 1.0},
                "not an object",
                {"Abbreviation": "LEC", "GridPosition": "NaN"}
            ],
            "laps": [{"Driver": "VER", "LapNumber": 1, "LapTime": 97_000.5}],
            "weather": [{"AirTemp": 27.1, "Rainfall": false}]
        });
        let data = SessionData::from_slice(doc.to_string().as_bytes()).unwrap();

        assert_eq!(data.event.event_name.as_deref(), Some("Bahrain Grand Prix"));
        assert!(data.event.location.is_none());
        assert_eq!(data.results.len(), 2);
        assert_eq!(data.results[0].driver_number, Some(1));
        assert_eq!(data.results[1].grid_position, None);
        assert_eq!(data.laps[0].lap_time_ms, Some(97_000.5));
        assert!(data.telemetry.is_empty());
        assert_eq!(data.weather[0].rainfall, Some(false));
    }

    #[test]
    fn test_telemetry_row_flattens_series() {
        let doc = json!({
            "telemetry": [{
                "Driver": "HAM",
                "LapNumber": 5,
                "Distance": [0.0, 10.0],
                "Speed": [280, "281.5"],
                "Throttle": [100, 99],
                "Brake": [false, true],
                "nGear": [7, 8]
            }]
        });
        let data = SessionData::from_slice(doc.to_string().as_bytes()).unwrap();
        let row = &data.telemetry[0];

        assert_eq!(row.driver.as_deref(), Some("HAM"));
        assert_eq!(row.data.brake, Some(vec![Some(0.0), Some(1.0)]));
        assert_eq!(row.data.gear, Some(vec![Some(7.0), Some(8.0)]));
        assert!(row.data.drs.is_none());
    }

    #[test]
    fn test_null_sections_read_as_empty() {
        let doc = json!({
            "event": { "EventName": "Monaco Grand Prix" },
            "results": [{ "Abbreviation": "VER" }],
            "laps": [{ "Driver": "VER", "LapNumber": 1, "LapTime": 74000.0 }],
            "weather": null,
            "telemetry": null,
            "race_control_messages": null
        });
        let data = SessionData::from_slice(doc.to_string().as_bytes()).unwrap();

        assert_eq!(data.results.len(), 1);
        assert_eq!(data.laps.len(), 1);
        assert!(data.weather.is_empty());
        assert!(data.telemetry.is_empty());
        assert!(data.race_control_messages.is_empty());
    }

    #[test]
    fn test_top_level_must_be_a_document() {
        let err = SessionData::from_slice(b"\"race.json\"").unwrap_err();
        assert_eq!(err.code(), "decode_error");
    }
}
