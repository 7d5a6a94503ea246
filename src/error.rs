//! Command precondition errors
//!
//! Each variant carries the hint an operator needs to fix the situation;
//! `main` prints the message and exits non-zero.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("race {id} does not exist (see `paddock list`)")]
    RaceNotFound { id: i64 },

    #[error(
        "data for {grand_prix} {year} has not been loaded yet; \
         run `paddock load --year {year} --round {round}` first"
    )]
    DataNotLoaded {
        grand_prix: String,
        year: i64,
        round: i64,
    },

    #[error("live timing credentials not set; export OPENF1_USERNAME and OPENF1_PASSWORD")]
    MissingCredentials,

    #[error("live timing authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("no provider cache directory configured; set PADDOCK_CACHE_DIR or provider.cache_dir")]
    CacheNotConfigured,

    #[error("start lap {start_lap} is beyond the race distance of {total_laps} laps")]
    StartLapOutOfRange { start_lap: i64, total_laps: i64 },
}
