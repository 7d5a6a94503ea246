use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use paddock::cli::{generate, list, live, load, serve, simulate};
use paddock::config::Config;
use paddock::store::RaceStore;

#[derive(Parser)]
#[command(name = "paddock")]
#[command(about = "F1 race timing loader, lap-by-lap replay and dashboard API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "paddock.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a finished race from the timing provider
    Load {
        /// Season year
        #[arg(long)]
        year: i64,

        /// Round number within the season
        #[arg(long)]
        round: i64,

        /// Replace data that is already loaded
        #[arg(long)]
        force: bool,

        /// Read the session document from a local JSON file instead
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// List stored races
    List {
        /// Only races of this season
        #[arg(long)]
        year: Option<i64>,

        /// Only the running race
        #[arg(long)]
        active: bool,
    },

    /// Follow the current session from the live timing API
    Live {
        /// Seconds between polling cycles
        #[arg(long, default_value_t = 3)]
        interval: u64,
    },

    /// Replay a loaded race lap by lap
    Simulate {
        /// Race ID (see `paddock list`)
        #[arg(long)]
        race: i64,

        /// Seconds per lap
        #[arg(long, default_value_t = 4)]
        interval: u64,

        /// Rewind the race to lap 0 and exit
        #[arg(long)]
        reset: bool,

        /// Start from this lap instead of the stored one
        #[arg(long)]
        start_lap: Option<i64>,
    },

    /// Write a synthetic race for dashboard testing
    Generate {
        /// Laps of timing data to generate
        #[arg(long, default_value_t = 20)]
        laps: i64,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Serve the dashboard JSON API
    Serve {
        /// Listen address (defaults to server.addr from the config)
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config).unwrap_or_default();
    let db_path = config.database_path();

    // Initialize store
    let store = RaceStore::open(&db_path)?;

    match cli.command {
        Commands::Load {
            year,
            round,
            force,
            file,
        } => {
            load::run(&store, &config, year, round, force, file).await?;
        }
        Commands::List { year, active } => {
            list::run(&store, year, active)?;
        }
        Commands::Live { interval } => {
            live::run(&store, &config, interval).await?;
        }
        Commands::Simulate {
            race,
            interval,
            reset,
            start_lap,
        } => {
            simulate::run(&store, race, interval, reset, start_lap).await?;
        }
        Commands::Generate { laps, seed } => {
            generate::run(&store, laps, seed)?;
        }
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            drop(store);
            serve::run(&db_path, &addr).await?;
        }
    }

    Ok(())
}
