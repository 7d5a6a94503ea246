//! Telemetry lap selection and downsampling

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::provider::lenient;

pub const MAX_TELEMETRY_POINTS: usize = 200;

/// One lap of car data as delivered by the provider; unreadable samples are `None`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTelemetry {
    #[serde(rename = "Distance", default, deserialize_with = "lenient::series")]
    pub distance: Option<Vec<Option<f64>>>,
    #[serde(rename = "Speed", default, deserialize_with = "lenient::series")]
    pub speed: Option<Vec<Option<f64>>>,
    #[serde(rename = "Throttle", default, deserialize_with = "lenient::series")]
    pub throttle: Option<Vec<Option<f64>>>,
    #[serde(rename = "Brake", default, deserialize_with = "lenient::series")]
    pub brake: Option<Vec<Option<f64>>>,
    #[serde(rename = "nGear", default, deserialize_with = "lenient::series")]
    pub gear: Option<Vec<Option<f64>>>,
    #[serde(rename = "DRS", default, deserialize_with = "lenient::series")]
    pub drs: Option<Vec<Option<f64>>>,
}

/// Stored form: parallel series of equal length, at most 200 points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryTrace {
    pub distance: Vec<f64>,
    pub speed: Vec<f64>,
    pub throttle: Vec<f64>,
    pub brake: Vec<f64>,
    pub gear: Vec<f64>,
    pub drs: Vec<f64>,
}

impl TelemetryTrace {
    /// Downsample and round a raw lap.
    ///
    /// Returns `None` when a required series (distance, speed, throttle,
    /// brake) is missing or empty, or when present series disagree in length.
    /// Missing gear/DRS series are stored as empty arrays.
    pub fn from_raw(raw: &RawTelemetry) -> Option<Self> {
        let distance = raw.distance.as_ref()?;
        let speed = raw.speed.as_ref()?;
        let throttle = raw.throttle.as_ref()?;
        let brake = raw.brake.as_ref()?;

        let len = distance.len();
        if len == 0 {
            return None;
        }
        let same_len = [
            Some(speed),
            Some(throttle),
            Some(brake),
            raw.gear.as_ref(),
            raw.drs.as_ref(),
        ]
        .into_iter()
        .flatten()
        .all(|s| s.len() == len);
        if !same_len {
            return None;
        }

        let indices = downsample_indices(len);
        let pick = |series: &[Option<f64>]| round_series(indices.iter().map(|&i| series[i]));
        let pick_optional = |series: Option<&Vec<Option<f64>>>| {
            series.map(|s| pick(s.as_slice())).unwrap_or_default()
        };

        Some(Self {
            distance: pick(distance.as_slice()),
            speed: pick(speed.as_slice()),
            throttle: pick(throttle.as_slice()),
            brake: pick(brake.as_slice()),
            gear: pick_optional(raw.gear.as_ref()),
            drs: pick_optional(raw.drs.as_ref()),
        })
    }

    pub fn len(&self) -> usize {
        self.distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }
}

/// Every 5th lap from lap 1, the final lap, and the last 10 laps
pub fn select_telemetry_laps(total_laps: i64) -> BTreeSet<i64> {
    if total_laps < 1 {
        return BTreeSet::new();
    }
    let mut laps: BTreeSet<i64> = (1..=total_laps).step_by(5).collect();
    laps.insert(total_laps);
    laps.extend((total_laps - 10).max(1)..=total_laps);
    laps
}

/// Uniform-stride sample positions: stride `len / 200`, truncated to 200
pub fn downsample_indices(len: usize) -> Vec<usize> {
    if len <= MAX_TELEMETRY_POINTS {
        return (0..len).collect();
    }
    let step = len / MAX_TELEMETRY_POINTS;
    (0..len).step_by(step).take(MAX_TELEMETRY_POINTS).collect()
}

/// Round to one decimal; missing and non-finite values become 0
pub fn round_series(values: impl IntoIterator<Item = Option<f64>>) -> Vec<f64> {
    values
        .into_iter()
        .map(|v| match v {
            Some(x) if x.is_finite() => (x * 10.0).round() / 10.0,
            _ => 0.0,
        })
        .collect()
}
