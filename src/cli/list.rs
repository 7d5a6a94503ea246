//! List command implementation

use anyhow::Result;

use crate::store::RaceStore;

pub fn run(store: &RaceStore, year: Option<i64>, active: bool) -> Result<()> {
    let races = store.list_races(year, active)?;

    if races.is_empty() {
        println!("No races found. Run 'paddock load --year <YEAR> --round <ROUND>' first.");
        return Ok(());
    }

    println!("{} race(s) found:\n", races.len());
    println!(
        "{:<5} {:<9} {:<30} {:<16} {:<10} {:<10} {}",
        "ID", "Event", "Grand Prix", "Country", "Status", "Laps", "Data"
    );
    println!("{}", "-".repeat(100));

    for race in races {
        let status = if race.is_running {
            "LIVE"
        } else if race.is_finished {
            "FINISHED"
        } else {
            "PENDING"
        };
        let data = if race.data_loaded { "loaded" } else { "no data" };

        // Truncate long event names
        let grand_prix = if race.grand_prix.chars().count() > 30 {
            format!("{}...", race.grand_prix.chars().take(27).collect::<String>())
        } else {
            race.grand_prix.clone()
        };

        println!(
            "{:<5} {:<9} {:<30} {:<16} {:<10} {:<10} {}",
            race.id,
            format!("{} R{:02}", race.year, race.round_number),
            grand_prix,
            race.country,
            status,
            format!("{}/{}", race.current_lap, race.total_laps),
            data,
        );
        println!(
            "      {} ({:.2} km)",
            race.circuit_name, race.circuit_length_km
        );
    }

    Ok(())
}
