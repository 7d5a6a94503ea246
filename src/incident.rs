//! Race-control message classification
//!
//! Shared by the batch loader and the live poller so both ingestion paths
//! agree on what a message means. Matching is case-insensitive substring
//! search on the message text.
//!
//! Driver attribution is best effort. Race-control text is free-form, so a
//! message is only tied to a driver when it carries an explicit racing number
//! or when a driver's abbreviation appears as a whole word in the text.
//! Anything else stays unattributed rather than guessed.

use crate::model::IncidentType;

/// Classify a race-control message. Rules are tried in order:
///
/// 1. "SAFETY CAR" without "VIRTUAL" → SC
/// 2. "VIRTUAL SAFETY CAR" or "VSC" → VSC
/// 3. "RED FLAG" → RED
/// 4. "PENALTY" → PENALTY
/// 5. anything else → OTHER
pub fn classify(message: &str) -> IncidentType {
    let upper = message.to_uppercase();
    if upper.contains("SAFETY CAR") && !upper.contains("VIRTUAL") {
        IncidentType::Sc
    } else if upper.contains("VIRTUAL SAFETY CAR") || upper.contains("VSC") {
        IncidentType::Vsc
    } else if upper.contains("RED FLAG") {
        IncidentType::Red
    } else if upper.contains("PENALTY") {
        IncidentType::Penalty
    } else {
        IncidentType::Other
    }
}

/// A driver the classifier may attribute a message to
#[derive(Debug, Clone, Copy)]
pub struct DriverKey<'a> {
    pub id: i64,
    pub abbreviation: &'a str,
    pub number: i64,
}

/// Pick the driver a message refers to, if it can be told reliably.
///
/// An explicit racing number wins; otherwise the first driver whose
/// abbreviation is a whole alphanumeric token of the message.
pub fn attribute_driver(
    message: &str,
    racing_number: Option<i64>,
    drivers: &[DriverKey<'_>],
) -> Option<i64> {
    if let Some(number) = racing_number {
        if let Some(driver) = drivers.iter().find(|d| d.number == number) {
            return Some(driver.id);
        }
    }

    let upper = message.to_uppercase();
    let tokens: Vec<&str> = upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    drivers
        .iter()
        .filter(|d| !d.abbreviation.is_empty())
        .find(|d| {
            let abbr = d.abbreviation.to_uppercase();
            tokens.iter().any(|t| *t == abbr)
        })
        .map(|d| d.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_safety_car_variants() {
        assert_eq!(classify("SAFETY CAR DEPLOYED"), IncidentType::Sc);
        assert_eq!(classify("Safety Car in this lap"), IncidentType::Sc);
        assert_eq!(classify("VIRTUAL SAFETY CAR DEPLOYED"), IncidentType::Vsc);
        assert_eq!(classify("VSC ENDING"), IncidentType::Vsc);
    }

    #[test]
    fn test_classify_other_categories() {
        assert_eq!(classify("RED FLAG"), IncidentType::Red);
        assert_eq!(
            classify("5 SECOND TIME PENALTY FOR CAR 44 (HAM) - CAUSING A COLLISION"),
            IncidentType::Penalty
        );
        assert_eq!(classify("DRS ENABLED"), IncidentType::Other);
        assert_eq!(classify(""), IncidentType::Other);
    }

    #[test]
    fn test_attribution_prefers_racing_number() {
        let drivers = [
            DriverKey { id: 1, abbreviation: "HAM", number: 44 },
            DriverKey { id: 2, abbreviation: "VER", number: 1 },
        ];
        assert_eq!(attribute_driver("CAR 1 (VER) TIME DELETED", Some(44), &drivers), Some(1));
        assert_eq!(attribute_driver("CAR 1 (VER) TIME DELETED", None, &drivers), Some(2));
        // Unknown number falls back to the text
        assert_eq!(attribute_driver("CAR 44 (HAM)", Some(99), &drivers), Some(1));
    }

    #[test]
    fn test_attribution_requires_whole_word() {
        let drivers = [DriverKey { id: 7, abbreviation: "HAM", number: 44 }];
        assert_eq!(attribute_driver("NEW LAP RECORD AT CHAMPIONSHIP", None, &drivers), None);
        assert_eq!(attribute_driver("incident involving ham and alo", None, &drivers), Some(7));
        assert_eq!(attribute_driver("SAFETY CAR DEPLOYED", None, &drivers), None);
    }
}
