//! Subcommand implementations

pub mod generate;
pub mod list;
pub mod live;
pub mod load;
pub mod serve;
pub mod simulate;
