//! Display strings shared by the payloads

/// `M:SS.mmm`, or "—" when the lap has no time
pub fn lap_time_str(lap_time_ms: Option<f64>) -> String {
    let Some(ms) = lap_time_ms else {
        return "—".to_string();
    };
    let millis = ms.round() as i64;
    let minutes = millis / 60_000;
    let rest = millis % 60_000;
    format!("{}:{:02}.{:03}", minutes, rest / 1000, rest % 1000)
}

/// "LEADER" at zero, "+S.sssS" behind, "—" when unknown
pub fn delta_str(delta_ms: Option<f64>) -> String {
    match delta_ms {
        None => "—".to_string(),
        Some(d) if d == 0.0 => "LEADER".to_string(),
        Some(d) if d < 0.0 => format!("-{:.3}s", -d / 1000.0),
        Some(d) => format!("+{:.3}s", d / 1000.0),
    }
}

/// Milliseconds to seconds at 3 dp; missing and zero sectors are `None`
pub fn sector_seconds(sector_ms: Option<f64>) -> Option<f64> {
    sector_ms.filter(|ms| *ms != 0.0).map(ms_to_seconds)
}

pub fn ms_to_seconds(ms: f64) -> f64 {
    ms.round() / 1000.0
}
