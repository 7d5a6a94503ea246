//! Tyre stint derivation

use crate::model::Compound;

/// One driver-lap as seen by the stint walk
#[derive(Debug, Clone)]
pub struct StintLap {
    pub lap_number: i64,
    pub compound: Option<String>,
    pub tyre_life: Option<f64>,
    pub fresh_tyre: Option<bool>,
}

/// A contiguous run of laps on one compound
#[derive(Debug, Clone, PartialEq)]
pub struct Stint {
    pub stint_number: i64,
    pub compound: Compound,
    pub start_lap: i64,
    /// `None` while the stint is still open
    pub end_lap: Option<i64>,
    pub tyre_age: i64,
    pub is_new: bool,
}

/// Incremental stint walk over one driver's laps, in lap order.
///
/// A new stint opens whenever the compound label differs from the previous
/// lap's, closing the previous one on the lap before. Exactly one stint is
/// open until [`StintBuilder::finish`] closes it at the last lap seen.
#[derive(Debug, Default)]
pub struct StintBuilder {
    stints: Vec<Stint>,
    current_label: Option<String>,
    last_lap: Option<i64>,
}

impl StintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, lap: &StintLap) {
        let label = compound_label(lap.compound.as_deref());
        let tyre_age = lap
            .tyre_life
            .filter(|v| v.is_finite())
            .map(|v| v as i64)
            .unwrap_or(0);

        if self.current_label.as_deref() != Some(label.as_str()) {
            if let Some(open) = self.stints.last_mut() {
                open.end_lap = Some(lap.lap_number - 1);
            }
            self.stints.push(Stint {
                stint_number: self.stints.len() as i64 + 1,
                compound: Compound::normalize(&label),
                start_lap: lap.lap_number,
                end_lap: None,
                tyre_age,
                is_new: lap.fresh_tyre.unwrap_or(true),
            });
            self.current_label = Some(label);
        } else if let Some(open) = self.stints.last_mut() {
            open.tyre_age = tyre_age;
        }
        self.last_lap = Some(lap.lap_number);
    }

    /// Stints whose end lap is not yet known
    pub fn open_count(&self) -> usize {
        self.stints.iter().filter(|s| s.end_lap.is_none()).count()
    }

    /// Provisional end of the open stint: the last lap scanned so far
    pub fn provisional_end(&self) -> Option<i64> {
        self.last_lap
    }

    pub fn finish(mut self) -> Vec<Stint> {
        if let (Some(open), Some(last)) = (self.stints.last_mut(), self.last_lap) {
            open.end_lap = Some(last);
        }
        self.stints
    }
}

/// Upper-cased compound string; missing, empty and "NAN" collapse to UNKNOWN
fn compound_label(raw: Option<&str>) -> String {
    let label = raw.unwrap_or("").trim().to_uppercase();
    if label.is_empty() || label == "NAN" {
        "UNKNOWN".to_string()
    } else {
        label
    }
}

/// Derive all stints for one driver; `laps` is sorted here by lap number
pub fn derive_stints(laps: &[StintLap]) -> Vec<Stint> {
    let mut sorted: Vec<&StintLap> = laps.iter().collect();
    sorted.sort_by_key(|l| l.lap_number);

    let mut builder = StintBuilder::new();
    for lap in sorted {
        builder.push(lap);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lap(n: i64, compound: &str, life: f64) -> StintLap {
        StintLap {
            lap_number: n,
            compound: Some(compound.to_string()),
            tyre_life: Some(life),
            fresh_tyre: Some(true),
        }
    }

    #[test]
    fn test_compound_change_opens_new_stint() {
        let laps = vec![
            lap(1, "MEDIUM", 1.0),
            lap(2, "MEDIUM", 2.0),
            lap(3, "MEDIUM", 3.0),
            lap(4, "HARD", 1.0),
            lap(5, "HARD", 2.0),
        ];
        let stints = derive_stints(&laps);

        assert_eq!(stints.len(), 2);
        assert_eq!(stints[0].compound, Compound::Medium);
        assert_eq!((stints[0].start_lap, stints[0].end_lap), (1, Some(3)));
        assert_eq!(stints[0].tyre_age, 3);
        assert_eq!(stints[1].compound, Compound::Hard);
        assert_eq!((stints[1].start_lap, stints[1].end_lap), (4, Some(5)));
        assert_eq!(stints[1].tyre_age, 2);
    }

    #[test]
    fn test_stints_are_contiguous() {
        let laps: Vec<StintLap> = (1..=30)
            .map(|n| {
                let compound = match n {
                    1..=9 => "SOFT",
                    10..=22 => "MEDIUM",
                    _ => "SOFT",
                };
                lap(n, compound, 1.0)
            })
            .collect();
        let stints = derive_stints(&laps);

        assert_eq!(stints.len(), 3);
        for pair in stints.windows(2) {
            assert_eq!(pair[0].end_lap.unwrap() + 1, pair[1].start_lap);
        }
        assert_eq!(stints.last().unwrap().end_lap, Some(30));
        assert!(stints.iter().map(|s| s.stint_number).eq(1..=3));
    }

    #[test]
    fn test_exactly_one_open_stint_while_scanning() {
        let mut builder = StintBuilder::new();
        for (n, c) in [(1, "SOFT"), (2, "SOFT"), (3, "HARD"), (4, "WET"), (5, "WET")] {
            builder.push(&lap(n, c, 1.0));
            assert_eq!(builder.open_count(), 1);
            assert_eq!(builder.provisional_end(), Some(n));
        }
        let stints = builder.finish();
        assert!(stints.iter().all(|s| s.end_lap.is_some()));
    }

    #[test]
    fn test_unrecognised_compounds_normalize_to_unknown() {
        let laps = vec![
            StintLap {
                lap_number: 1,
                compound: None,
                tyre_life: None,
                fresh_tyre: None,
            },
            lap(2, "nan", 2.0),
            lap(3, "TEST_UNKNOWN", 3.0),
        ];
        let stints = derive_stints(&laps);

        // None and "nan" share a label, the odd string opens its own stint
        assert_eq!(stints.len(), 2);
        assert!(stints.iter().all(|s| s.compound == Compound::Unknown));
        assert!(stints[0].is_new);
        assert_eq!(stints[0].end_lap, Some(2));
    }

    #[test]
    fn test_unsorted_input_is_walked_in_lap_order() {
        let laps = vec![lap(3, "HARD", 1.0), lap(1, "SOFT", 1.0), lap(2, "SOFT", 2.0)];
        let stints = derive_stints(&laps);
        assert_eq!(stints[0].compound, Compound::Soft);
        assert_eq!(stints[0].end_lap, Some(2));
        assert_eq!(stints[1].start_lap, 3);
    }

    #[test]
    fn test_no_laps_no_stints() {
        assert!(derive_stints(&[]).is_empty());
    }
}
