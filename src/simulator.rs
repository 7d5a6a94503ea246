//! Lap-by-lap race replay
//!
//! [`Simulation`] is a plain state machine over a race's progress fields.
//! [`run`] drives it from a [`TickSource`] and persists every transition, so
//! the stored row is consistent whenever the clock stops.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::CommandError;
use crate::model::{IncidentType, SafetyCar};
use crate::store::{RaceProgress, RaceRow, RaceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// Lap 0, never started
    Pending,
    /// Stopped part-way; resumes from `current_lap`
    Paused,
    Running,
    Finished,
}

/// Result of one advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LapTick {
    pub lap: i64,
    pub total_laps: i64,
    /// Flag shown on this lap, before the finish clears it
    pub safety_car: SafetyCar,
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    race_id: i64,
    total_laps: i64,
    progress: RaceProgress,
    sc_laps: BTreeSet<i64>,
    vsc_laps: BTreeSet<i64>,
}

impl Simulation {
    pub fn new(race: &RaceRow, sc_laps: BTreeSet<i64>, vsc_laps: BTreeSet<i64>) -> Self {
        Self {
            race_id: race.id,
            total_laps: race.total_laps,
            progress: race.progress(),
            sc_laps,
            vsc_laps,
        }
    }

    /// Build from the stored race and its SC/VSC incident laps
    pub fn load(store: &RaceStore, race: &RaceRow) -> Result<Self> {
        let sc = store.incident_laps(race.id, IncidentType::Sc)?;
        let vsc = store.incident_laps(race.id, IncidentType::Vsc)?;
        Ok(Self::new(race, sc, vsc))
    }

    pub fn race_id(&self) -> i64 {
        self.race_id
    }

    pub fn total_laps(&self) -> i64 {
        self.total_laps
    }

    pub fn progress(&self) -> RaceProgress {
        self.progress
    }

    pub fn state(&self) -> SimState {
        let p = &self.progress;
        if p.is_finished {
            SimState::Finished
        } else if p.is_running {
            SimState::Running
        } else if p.current_lap == 0 {
            SimState::Pending
        } else {
            SimState::Paused
        }
    }

    /// Move the cursor before starting (`--start-lap`)
    pub fn seek(&mut self, lap: i64) -> Result<(), CommandError> {
        if lap < 0 || lap > self.total_laps {
            return Err(CommandError::StartLapOutOfRange {
                start_lap: lap,
                total_laps: self.total_laps,
            });
        }
        self.progress.current_lap = lap;
        self.progress.is_finished = false;
        Ok(())
    }

    /// Enter Running. A race already at its last lap finishes immediately.
    pub fn start(&mut self) {
        if self.progress.current_lap >= self.total_laps {
            self.finish();
        } else {
            self.progress.is_running = true;
            self.progress.is_finished = false;
        }
    }

    /// Advance one lap. `None` unless Running.
    pub fn tick(&mut self) -> Option<LapTick> {
        if self.state() != SimState::Running {
            return None;
        }
        let lap = self.progress.current_lap + 1;
        let safety_car = self.safety_car_at(lap);
        self.progress.current_lap = lap;
        self.progress.safety_car = safety_car;

        let finished = lap >= self.total_laps;
        if finished {
            self.finish();
        }
        Some(LapTick {
            lap,
            total_laps: self.total_laps,
            safety_car,
            finished,
        })
    }

    /// Stop without losing the lap
    pub fn interrupt(&mut self) {
        self.progress.is_running = false;
    }

    pub fn reset(&mut self) {
        self.progress = RaceProgress {
            current_lap: 0,
            is_running: false,
            is_finished: false,
            safety_car: SafetyCar::None,
        };
    }

    /// SC beats VSC; any other lap is NONE
    fn safety_car_at(&self, lap: i64) -> SafetyCar {
        if self.sc_laps.contains(&lap) {
            SafetyCar::Sc
        } else if self.vsc_laps.contains(&lap) {
            SafetyCar::Vsc
        } else {
            SafetyCar::None
        }
    }

    fn finish(&mut self) {
        self.progress.current_lap = self.total_laps;
        self.progress.is_running = false;
        self.progress.is_finished = true;
        self.progress.safety_car = SafetyCar::None;
    }
}

// ============================================
// CLOCK
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Advance,
    /// Operator cancel or exhausted source
    Stop,
}

#[async_trait]
pub trait TickSource: Send {
    async fn next_tick(&mut self) -> Tick;
}

/// Wall-clock ticks that stop on Ctrl+C. The first tick fires immediately.
pub struct IntervalTicks {
    interval: Interval,
    ctrl_c: Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>,
}

impl IntervalTicks {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            ctrl_c: Box::pin(tokio::signal::ctrl_c()),
        }
    }
}

#[async_trait]
impl TickSource for IntervalTicks {
    async fn next_tick(&mut self) -> Tick {
        tokio::select! {
            _ = &mut self.ctrl_c => Tick::Stop,
            _ = self.interval.tick() => Tick::Advance,
        }
    }
}

/// Fixed number of immediate ticks, then Stop
#[derive(Debug, Clone)]
pub struct ManualTicks {
    remaining: usize,
}

impl ManualTicks {
    pub fn new(ticks: usize) -> Self {
        Self { remaining: ticks }
    }
}

#[async_trait]
impl TickSource for ManualTicks {
    async fn next_tick(&mut self) -> Tick {
        if self.remaining == 0 {
            return Tick::Stop;
        }
        self.remaining -= 1;
        Tick::Advance
    }
}

// ============================================
// DRIVER
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Interrupted { lap: i64 },
}

/// Start the simulation and advance it on every tick until the race
/// finishes or the source stops. Every transition is persisted.
pub async fn run(
    store: &RaceStore,
    sim: &mut Simulation,
    ticks: &mut dyn TickSource,
    mut on_lap: impl FnMut(&LapTick),
) -> Result<RunOutcome> {
    sim.start();
    store.save_progress(sim.race_id(), &sim.progress())?;

    while sim.state() == SimState::Running {
        if ticks.next_tick().await == Tick::Stop {
            sim.interrupt();
            store.save_progress(sim.race_id(), &sim.progress())?;
            return Ok(RunOutcome::Interrupted {
                lap: sim.progress().current_lap,
            });
        }
        if let Some(tick) = sim.tick() {
            store.save_progress(sim.race_id(), &sim.progress())?;
            on_lap(&tick);
        }
    }
    Ok(RunOutcome::Finished)
}
