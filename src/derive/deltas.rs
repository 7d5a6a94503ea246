//! Delta-to-leader computation

use std::collections::{BTreeMap, HashMap};

use crate::store::LapTimingRow;

/// Compute `delta_to_leader_ms` for every timing row at laps `1..=total_laps`.
///
/// For lap L the leader is the row at position 1, else the lowest position
/// recorded on that lap. A driver's cumulative time at L is the sum of their
/// non-null lap times for laps <= L. Each row's delta is its driver's
/// cumulative time minus the leader's, or `None` when the driver has no timed
/// lap yet. Laps whose leader has no cumulative time are left untouched.
///
/// Returns `(timing_id, delta)` pairs for the rows that were assigned.
pub fn compute_deltas(timings: &[LapTimingRow], total_laps: i64) -> Vec<(i64, Option<f64>)> {
    let mut by_lap: BTreeMap<i64, Vec<&LapTimingRow>> = BTreeMap::new();
    for timing in timings {
        by_lap.entry(timing.lap_number).or_default().push(timing);
    }

    // Running cumulative time per driver, advanced lap by lap
    let mut cumulative: HashMap<i64, f64> = HashMap::new();

    for rows in by_lap.range(..1).map(|(_, rows)| rows) {
        add_lap(rows, &mut cumulative);
    }

    let mut deltas = Vec::new();
    for lap in 1..=total_laps {
        let Some(rows) = by_lap.get(&lap) else {
            continue;
        };
        add_lap(rows, &mut cumulative);

        let leader = rows
            .iter()
            .find(|r| r.position == 1)
            .or_else(|| rows.iter().min_by_key(|r| (r.position, r.id)));
        let Some(leader) = leader else {
            continue;
        };
        let Some(&leader_total) = cumulative.get(&leader.driver_id) else {
            continue;
        };

        for row in rows {
            let delta = cumulative.get(&row.driver_id).map(|own| own - leader_total);
            deltas.push((row.id, delta));
        }
    }

    deltas
}

fn add_lap(rows: &[&LapTimingRow], cumulative: &mut HashMap<i64, f64>) {
    for row in rows {
        if let Some(ms) = row.lap_time_ms {
            *cumulative.entry(row.driver_id).or_insert(0.0) += ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(id: i64, driver_id: i64, lap: i64, position: i64, ms: Option<f64>) -> LapTimingRow {
        LapTimingRow {
            id,
            driver_id,
            lap_number: lap,
            position,
            lap_time_ms: ms,
            sector1_ms: None,
            sector2_ms: None,
            sector3_ms: None,
            delta_to_leader_ms: None,
            is_personal_best: false,
        }
    }

    fn delta_of(deltas: &[(i64, Option<f64>)], id: i64) -> Option<f64> {
        deltas.iter().find(|(t, _)| *t == id).and_then(|(_, d)| *d)
    }

    #[test]
    fn test_delta_is_cumulative_difference_to_leader() {
        // driver 1 leads both laps, driver 2 loses 0.5s then 0.7s
        let timings = vec![
            timing(1, 1, 1, 1, Some(90_000.0)),
            timing(2, 2, 1, 2, Some(90_500.0)),
            timing(3, 1, 2, 1, Some(89_000.0)),
            timing(4, 2, 2, 2, Some(89_700.0)),
        ];
        let deltas = compute_deltas(&timings, 2);

        assert_eq!(delta_of(&deltas, 1), Some(0.0));
        assert_eq!(delta_of(&deltas, 2), Some(500.0));
        assert_eq!(delta_of(&deltas, 3), Some(0.0));
        assert_eq!(delta_of(&deltas, 4), Some(1_200.0));
    }

    #[test]
    fn test_leader_changes_follow_position_one() {
        // driver 2 passes on lap 2 and is now the reference
        let timings = vec![
            timing(1, 1, 1, 1, Some(90_000.0)),
            timing(2, 2, 1, 2, Some(90_100.0)),
            timing(3, 1, 2, 2, Some(95_000.0)),
            timing(4, 2, 2, 1, Some(90_000.0)),
        ];
        let deltas = compute_deltas(&timings, 2);

        assert_eq!(delta_of(&deltas, 4), Some(0.0));
        assert_eq!(delta_of(&deltas, 3), Some(185_000.0 - 180_100.0));
    }

    #[test]
    fn test_missing_lap_time_keeps_previous_cumulative() {
        let timings = vec![
            timing(1, 1, 1, 1, Some(90_000.0)),
            timing(2, 2, 1, 2, None),
            timing(3, 1, 2, 1, Some(90_000.0)),
            timing(4, 2, 2, 2, Some(91_000.0)),
        ];
        let deltas = compute_deltas(&timings, 2);

        // No timed lap yet for driver 2 on lap 1
        assert_eq!(deltas.iter().find(|(t, _)| *t == 2).unwrap().1, None);
        assert_eq!(delta_of(&deltas, 4), Some(91_000.0 - 180_000.0));
    }

    #[test]
    fn test_leader_without_time_skips_lap() {
        let timings = vec![
            timing(1, 1, 1, 1, None),
            timing(2, 2, 1, 2, Some(90_000.0)),
        ];
        assert!(compute_deltas(&timings, 1).is_empty());
    }

    #[test]
    fn test_falls_back_to_lowest_position_without_p1() {
        let timings = vec![
            timing(1, 1, 1, 3, Some(92_000.0)),
            timing(2, 2, 1, 2, Some(90_000.0)),
        ];
        let deltas = compute_deltas(&timings, 1);
        assert_eq!(delta_of(&deltas, 2), Some(0.0));
        assert_eq!(delta_of(&deltas, 1), Some(2_000.0));
    }

    #[test]
    fn test_laps_beyond_total_are_ignored() {
        let timings = vec![timing(1, 1, 3, 1, Some(90_000.0))];
        assert!(compute_deltas(&timings, 2).is_empty());
    }
}
