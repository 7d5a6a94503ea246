pub mod api;
pub mod cli;
pub mod config;
pub mod derive;
pub mod error;
pub mod incident;
pub mod live;
pub mod loader;
pub mod model;
pub mod provider;
pub mod simulator;
pub mod store;

pub use config::Config;
pub use store::RaceStore;
