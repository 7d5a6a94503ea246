//! Simulate command implementation

use anyhow::Result;
use std::time::Duration;

use crate::error::CommandError;
use crate::model::SafetyCar;
use crate::simulator::{self, IntervalTicks, LapTick, RunOutcome, SimState, Simulation};
use crate::store::RaceStore;

const BAR_WIDTH: i64 = 30;

pub async fn run(
    store: &RaceStore,
    race_id: i64,
    interval_secs: u64,
    reset: bool,
    start_lap: Option<i64>,
) -> Result<()> {
    let race = store
        .get_race(race_id)?
        .ok_or(CommandError::RaceNotFound { id: race_id })?;
    if !race.data_loaded {
        return Err(CommandError::DataNotLoaded {
            grand_prix: race.grand_prix,
            year: race.year,
            round: race.round_number,
        }
        .into());
    }

    let mut sim = Simulation::load(store, &race)?;

    if reset {
        sim.reset();
        store.save_progress(race.id, &sim.progress())?;
        println!("Race {} reset to lap 0.", race.grand_prix);
        return Ok(());
    }

    if let Some(lap) = start_lap.filter(|l| *l > 0) {
        sim.seek(lap)?;
        store.save_progress(race.id, &sim.progress())?;
    }

    if sim.state() == SimState::Finished {
        println!(
            "{} is already finished. Reset it with: paddock simulate --race {} --reset",
            race.grand_prix, race.id
        );
        return Ok(());
    }

    println!("{}", "=".repeat(60));
    println!("  RACE SIMULATION: {} {}", race.grand_prix, race.year);
    println!("  Total laps: {}", sim.total_laps());
    println!("  Interval: {}s between laps", interval_secs);
    println!("  Starting from lap: {}", sim.progress().current_lap);
    println!("{}", "=".repeat(60));
    println!("  Press Ctrl+C to stop the simulation.\n");

    let mut ticks = IntervalTicks::new(Duration::from_secs(interval_secs.max(1)));
    let outcome = simulator::run(store, &mut sim, &mut ticks, |tick| {
        println!("{}", progress_line(tick));
    })
    .await?;

    match outcome {
        RunOutcome::Finished => {
            println!("\n{}", "=".repeat(60));
            println!("  RACE FINISHED!");
            println!("{}", "=".repeat(60));
        }
        RunOutcome::Interrupted { lap } => {
            println!("\n  Simulation stopped at lap {}.", lap);
            println!("  Resume with: paddock simulate --race {}", race.id);
            println!("  Reset with:  paddock simulate --race {} --reset", race.id);
        }
    }
    Ok(())
}

fn progress_line(tick: &LapTick) -> String {
    let total = tick.total_laps.max(1);
    let filled = (BAR_WIDTH * tick.lap / total).clamp(0, BAR_WIDTH) as usize;
    let bar = format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH as usize - filled)
    );
    let percent = tick.lap as f64 / total as f64 * 100.0;
    let flag = match tick.safety_car {
        SafetyCar::Sc => " SAFETY CAR",
        SafetyCar::Vsc => " VSC",
        SafetyCar::Red => " RED FLAG",
        SafetyCar::None => "",
    };
    format!(
        "  Lap {:3}/{} [{}] {:5.1}%{}",
        tick.lap, tick.total_laps, bar, percent, flag
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        let line = progress_line(&LapTick {
            lap: 15,
            total_laps: 30,
            safety_car: SafetyCar::Vsc,
            finished: false,
        });
        assert_eq!(
            line,
            format!("  Lap  15/30 [{}{}]  50.0% VSC", "█".repeat(15), "░".repeat(15))
        );
    }
}
