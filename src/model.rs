//! Closed vocabularies shared by the store, the ingestion paths and the API.

use serde::Serialize;

/// Race-control state shown for the current lap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SafetyCar {
    None,
    Sc,
    Vsc,
    Red,
}

impl SafetyCar {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyCar::None => "NONE",
            SafetyCar::Sc => "SC",
            SafetyCar::Vsc => "VSC",
            SafetyCar::Red => "RED",
        }
    }

    /// Unknown values read back from the database fall back to NONE
    pub fn parse(value: &str) -> Self {
        match value {
            "SC" => SafetyCar::Sc,
            "VSC" => SafetyCar::Vsc,
            "RED" => SafetyCar::Red,
            _ => SafetyCar::None,
        }
    }
}

/// Tyre compound of a stint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
    Unknown,
}

impl Compound {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compound::Soft => "SOFT",
            Compound::Medium => "MEDIUM",
            Compound::Hard => "HARD",
            Compound::Intermediate => "INTERMEDIATE",
            Compound::Wet => "WET",
            Compound::Unknown => "UNKNOWN",
        }
    }

    /// Case-insensitive; anything unrecognised (including empty and "nan") is UNKNOWN
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SOFT" => Compound::Soft,
            "MEDIUM" => Compound::Medium,
            "HARD" => Compound::Hard,
            "INTERMEDIATE" => Compound::Intermediate,
            "WET" => Compound::Wet,
            _ => Compound::Unknown,
        }
    }
}

/// Category of a race incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentType {
    Sc,
    Vsc,
    Red,
    Penalty,
    Dnf,
    Other,
}

impl IncidentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::Sc => "SC",
            IncidentType::Vsc => "VSC",
            IncidentType::Red => "RED",
            IncidentType::Penalty => "PENALTY",
            IncidentType::Dnf => "DNF",
            IncidentType::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "SC" => IncidentType::Sc,
            "VSC" => IncidentType::Vsc,
            "RED" => IncidentType::Red,
            "PENALTY" => IncidentType::Penalty,
            "DNF" => IncidentType::Dnf,
            _ => IncidentType::Other,
        }
    }

    /// Human-readable label for the dashboard
    pub fn display(&self) -> &'static str {
        match self {
            IncidentType::Sc => "Safety Car",
            IncidentType::Vsc => "Virtual Safety Car",
            IncidentType::Red => "Red Flag",
            IncidentType::Penalty => "Penalty",
            IncidentType::Dnf => "Retirement",
            IncidentType::Other => "Other",
        }
    }
}
