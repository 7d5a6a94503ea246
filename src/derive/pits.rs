//! Pit stop detection

/// Pit timestamps of one driver-lap, in session milliseconds
#[derive(Debug, Clone)]
pub struct PitLap {
    pub lap_number: i64,
    pub pit_in_ms: Option<f64>,
    pub pit_out_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitStopEvent {
    pub stop_number: i64,
    pub lap_number: i64,
    /// Pit-out minus pit-in, when both were recorded on the lap
    pub duration_ms: Option<f64>,
}

/// Every lap with a pit-in timestamp is a stop, numbered from 1 in lap order
pub fn detect_pit_stops(laps: &[PitLap]) -> Vec<PitStopEvent> {
    let mut sorted: Vec<&PitLap> = laps.iter().collect();
    sorted.sort_by_key(|l| l.lap_number);

    sorted
        .into_iter()
        .filter_map(|lap| {
            let pit_in = lap.pit_in_ms.filter(|v| v.is_finite())?;
            let duration_ms = lap
                .pit_out_ms
                .filter(|v| v.is_finite())
                .map(|out| out - pit_in);
            Some((lap.lap_number, duration_ms))
        })
        .enumerate()
        .map(|(i, (lap_number, duration_ms))| PitStopEvent {
            stop_number: i as i64 + 1,
            lap_number,
            duration_ms,
        })
        .collect()
}
