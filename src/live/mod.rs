//! Live timing ingestion
//!
//! `client` speaks the remote API, `poller` maps each polling cycle onto the
//! store using the same natural keys the batch loader writes.

mod client;
mod poller;

use std::fmt;

use crate::error::CommandError;

pub use client::{LiveDriver, LiveLap, LiveRaceControl, LiveSession, OpenF1Client};
pub use poller::{poll_once, run, CycleReport};

pub const USERNAME_ENV: &str = "OPENF1_USERNAME";
pub const PASSWORD_ENV: &str = "OPENF1_PASSWORD";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_env() -> Result<Self, CommandError> {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        match (read(USERNAME_ENV), read(PASSWORD_ENV)) {
            (Some(username), Some(password)) => Ok(Self { username, password }),
            _ => Err(CommandError::MissingCredentials),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
