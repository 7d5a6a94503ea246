//! Load command implementation

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::CommandError;
use crate::loader::{self, LoadOutcome};
use crate::provider::{ArchiveSource, FileSource, SessionSource};
use crate::store::RaceStore;

pub async fn run(
    store: &RaceStore,
    config: &Config,
    year: i64,
    round: i64,
    force: bool,
    file: Option<PathBuf>,
) -> Result<()> {
    let source: Box<dyn SessionSource> = match file {
        Some(path) => Box::new(FileSource::new(path)),
        None => {
            let cache_dir = config.cache_dir().ok_or(CommandError::CacheNotConfigured)?;
            Box::new(ArchiveSource::new(
                &config.provider.base_url,
                cache_dir,
                config.provider_timeout(),
            )?)
        }
    };

    println!("{}", "=".repeat(60));
    println!("  Loading race data: {} round {}", year, round);
    println!("  Source: {}", source.describe());
    println!("{}", "=".repeat(60));

    match loader::load_race(store, source.as_ref(), year, round, force).await? {
        LoadOutcome::AlreadyLoaded { grand_prix, .. } => {
            println!(
                "Warning: data for {} {} is already loaded. Use --force to overwrite.",
                grand_prix, year
            );
        }
        LoadOutcome::Loaded(summary) => {
            println!("\nLoaded {} ({})", summary.grand_prix, summary.circuit_name);
            println!("  Race ID:     {}", summary.race_id);
            println!("  Laps:        {}", summary.total_laps);
            println!("  Drivers:     {}", summary.drivers);
            println!("  Lap timings: {}", summary.lap_timings);
            println!("  Pit stops:   {}", summary.pit_stops);
            println!("  Tyre stints: {}", summary.tyre_stints);
            println!("  Telemetry:   {} laps", summary.telemetry_laps);
            println!("  Incidents:   {}", summary.incidents);
            println!("\nStart the replay with: paddock simulate --race {}", summary.race_id);
        }
    }

    Ok(())
}
