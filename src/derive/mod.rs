//! Load-time derivations
//!
//! Pure functions over provider-neutral inputs. The loader feeds them what
//! it has already stored or parsed and writes their results back; nothing in
//! here touches the database or the network.

mod deltas;
mod pits;
mod stints;
mod telemetry;

pub use deltas::compute_deltas;
pub use pits::{detect_pit_stops, PitLap, PitStopEvent};
pub use stints::{derive_stints, Stint, StintBuilder, StintLap};
pub use telemetry::{
    downsample_indices, round_series, select_telemetry_laps, RawTelemetry, TelemetryTrace,
    MAX_TELEMETRY_POINTS,
};
