//! Encounter, Condition and Procedure wire models and their flat domain records.
//!
//! Unlike Patient mapping, these translations never fail. Every sub-field is read leniently and
//! a missing or malformed value maps to a fixed placeholder string.

use crate::lenient::lenient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UNKNOWN_DATE: &str = "Unknown Date";
pub const DEFAULT_ENCOUNTER_TYPE: &str = "Encounter";
pub const UNKNOWN_PRACTITIONER: &str = "Unknown Practitioner";
pub const NO_CODE: &str = "N/A";
pub const NO_DESCRIPTION: &str = "No description provided";

// ============================================================================
// Public domain-level types
// ============================================================================

/// A clinical visit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: String,

    /// Calendar date of the period start (`YYYY-MM-DD`), or [`UNKNOWN_DATE`].
    pub date: String,

    /// Visit type label.
    #[serde(rename = "type")]
    pub kind: String,

    pub practitioner: String,
}

/// A diagnosis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: String,
    pub code: String,
    pub description: String,
}

/// A performed procedure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: String,
    pub code: String,
    pub description: String,
}

impl Encounter {
    /// Map an Encounter resource. `fallback_id` is used when the resource carries no id.
    pub fn from_resource(resource: &Value, fallback_id: &str) -> Encounter {
        let wire = EncounterWire::deserialize(resource).unwrap_or_default();

        let date = wire
            .period
            .and_then(|p| p.start)
            .map(|start| calendar_date(&start).to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());

        let kind = wire
            .kind
            .first()
            .and_then(CodeableConceptWire::label)
            .unwrap_or(DEFAULT_ENCOUNTER_TYPE)
            .to_string();

        let practitioner = wire
            .participant
            .first()
            .and_then(ParticipantWire::display)
            .unwrap_or(UNKNOWN_PRACTITIONER)
            .to_string();

        Encounter {
            id: resolve_id(wire.id, fallback_id),
            date,
            kind,
            practitioner,
        }
    }
}

impl Condition {
    /// Map a Condition resource. `fallback_id` is used when the resource carries no id.
    pub fn from_resource(resource: &Value, fallback_id: &str) -> Condition {
        let (id, code, description) = coded_fields(resource, fallback_id);
        Condition {
            id,
            code,
            description,
        }
    }
}

impl Procedure {
    /// Map a Procedure resource. `fallback_id` is used when the resource carries no id.
    pub fn from_resource(resource: &Value, fallback_id: &str) -> Procedure {
        let (id, code, description) = coded_fields(resource, fallback_id);
        Procedure {
            id,
            code,
            description,
        }
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct EncounterWire {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    period: Option<PeriodWire>,

    #[serde(rename = "type", default, deserialize_with = "lenient")]
    kind: Vec<CodeableConceptWire>,

    #[serde(default, deserialize_with = "lenient")]
    participant: Vec<ParticipantWire>,
}

/// Shared shape of Condition and Procedure: an id and a `code` concept.
#[derive(Debug, Default, Deserialize)]
struct CodedResourceWire {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    code: Option<CodeableConceptWire>,
}

#[derive(Debug, Default, Deserialize)]
struct PeriodWire {
    #[serde(default, deserialize_with = "lenient")]
    start: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CodeableConceptWire {
    #[serde(default, deserialize_with = "lenient")]
    text: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    coding: Vec<CodingWire>,
}

#[derive(Debug, Default, Deserialize)]
struct CodingWire {
    #[serde(default, deserialize_with = "lenient")]
    code: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    display: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ParticipantWire {
    #[serde(default, deserialize_with = "lenient")]
    individual: Option<ReferenceWire>,

    /// R5 renamed `individual` to `actor`.
    #[serde(default, deserialize_with = "lenient")]
    actor: Option<ReferenceWire>,
}

#[derive(Debug, Default, Deserialize)]
struct ReferenceWire {
    #[serde(default, deserialize_with = "lenient")]
    display: Option<String>,
}

impl CodeableConceptWire {
    fn label(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
            .or_else(|| non_blank(self.coding.first().and_then(|c| c.display.as_deref())))
    }

    fn first_code(&self) -> Option<&str> {
        non_blank(self.coding.first().and_then(|c| c.code.as_deref()))
    }
}

impl ParticipantWire {
    fn display(&self) -> Option<&str> {
        non_blank(self.individual.as_ref().and_then(|r| r.display.as_deref()))
            .or_else(|| non_blank(self.actor.as_ref().and_then(|r| r.display.as_deref())))
    }
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn coded_fields(resource: &Value, fallback_id: &str) -> (String, String, String) {
    let wire = CodedResourceWire::deserialize(resource).unwrap_or_default();

    let code = wire
        .code
        .as_ref()
        .and_then(CodeableConceptWire::first_code)
        .unwrap_or(NO_CODE)
        .to_string();

    let description = wire
        .code
        .as_ref()
        .and_then(CodeableConceptWire::label)
        .unwrap_or(NO_DESCRIPTION)
        .to_string();

    (resolve_id(wire.id, fallback_id), code, description)
}

fn resolve_id(id: Option<String>, fallback_id: &str) -> String {
    id.filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| fallback_id.to_string())
}

/// The calendar-date portion of a FHIR dateTime (`2023-10-26T09:30:00Z` → `2023-10-26`).
fn calendar_date(date_time: &str) -> &str {
    date_time
        .split('T')
        .next()
        .unwrap_or_default()
        .trim()
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}
