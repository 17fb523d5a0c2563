//! FHIR Patient wire model and translation to the flat domain record.
//!
//! Responsibilities:
//! - Define the public [`Patient`] record used throughout the claim workflow
//! - Define a wire model for the subset of the FHIR Patient resource that is read
//! - Translate names, gender and addresses into display-ready strings
//!
//! Notes:
//! - Patient mapping is strict: a wrongly-typed field is an error (reported with its JSON path).
//!   Callers decide whether that error is fatal. The bundle parser treats it as "no patient".
//! - Missing optional fields are never errors; they map to documented placeholder strings.

use crate::{FhirError, FhirResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Display name used when a Patient has no usable name parts.
pub const UNKNOWN_NAME: &str = "Unknown Name";
/// Birth date used when a Patient has no `birthDate`.
pub const UNKNOWN_BIRTH_DATE: &str = "Unknown";
/// Address used when a Patient has no (non-empty) first address.
pub const NO_ADDRESS: &str = "No address on file";

// ============================================================================
// Public domain-level types
// ============================================================================

/// Administrative gender.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    /// Parse from the FHIR wire string. Unrecognised values map to [`Gender::Unknown`].
    fn from_wire(s: &str) -> Self {
        match s {
            "male" => Gender::Male,
            "female" => Gender::Female,
            "other" => Gender::Other,
            _ => Gender::Unknown,
        }
    }

    /// Capitalised label for display ("Male", "Female", ...).
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
            Gender::Unknown => "Unknown",
        }
    }
}

/// Flat patient record, built once per session from a search result or launch context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// FHIR logical id.
    pub id: String,

    /// Given names followed by the family name, space separated.
    pub name: String,

    /// ISO 8601 date (`YYYY-MM-DD`) or [`UNKNOWN_BIRTH_DATE`].
    pub birth_date: String,

    pub gender: Gender,

    /// First address formatted as `line, city, state postalCode`.
    pub address: String,
}

impl Patient {
    /// Map a FHIR Patient resource (as JSON) into a [`Patient`].
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - any mapped field has an unexpected type (the message names the JSON path),
    /// - `resourceType` is not `"Patient"`,
    /// - the resource has no `id`.
    pub fn from_resource(resource: &Value) -> FhirResult<Patient> {
        let wire = match serde_path_to_error::deserialize::<_, PatientWire>(resource) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(FhirError::Translation(format!(
                    "Patient schema mismatch at {path}: {source}"
                )));
            }
        };

        if wire.resource_type != "Patient" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Patient', got '{}'",
                wire.resource_type
            )));
        }

        wire_to_domain(wire)
    }

    /// Age in whole years on `today`.
    ///
    /// Returns `None` when the birth date is not an ISO calendar date (for example
    /// [`UNKNOWN_BIRTH_DATE`]) or lies after `today`.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = NaiveDate::parse_from_str(&self.birth_date, "%Y-%m-%d").ok()?;
        if birth > today {
            return None;
        }
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct PatientWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    id: Option<String>,

    #[serde(default)]
    name: Vec<HumanNameWire>,

    #[serde(rename = "birthDate")]
    birth_date: Option<String>,

    gender: Option<String>,

    #[serde(default)]
    address: Vec<AddressWire>,
}

#[derive(Debug, Deserialize)]
struct HumanNameWire {
    text: Option<String>,

    #[serde(default)]
    given: Vec<String>,

    family: Option<FamilyWire>,
}

/// R4 carries `family` as a string, DSTU2 as a list of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FamilyWire {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct AddressWire {
    #[serde(default)]
    line: Vec<String>,

    city: Option<String>,

    state: Option<String>,

    #[serde(rename = "postalCode")]
    postal_code: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(wire: PatientWire) -> FhirResult<Patient> {
    let id = wire
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| FhirError::Translation("Patient resource has no id".into()))?;

    Ok(Patient {
        id,
        name: display_name(wire.name.first()),
        birth_date: wire
            .birth_date
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_BIRTH_DATE.to_string()),
        gender: wire
            .gender
            .as_deref()
            .map(Gender::from_wire)
            .unwrap_or_default(),
        address: format_address(wire.address.first()),
    })
}

fn display_name(name: Option<&HumanNameWire>) -> String {
    let Some(name) = name else {
        return UNKNOWN_NAME.to_string();
    };

    let family: Vec<&str> = match &name.family {
        Some(FamilyWire::One(family)) => vec![family.as_str()],
        Some(FamilyWire::Many(parts)) => parts.iter().map(String::as_str).collect(),
        None => Vec::new(),
    };

    let joined = name
        .given
        .iter()
        .map(String::as_str)
        .chain(family)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if !joined.is_empty() {
        return joined;
    }

    name.text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(UNKNOWN_NAME)
        .to_string()
}

fn format_address(address: Option<&AddressWire>) -> String {
    let Some(address) = address else {
        return NO_ADDRESS.to_string();
    };

    let line = address.line.join(" ");
    let city = address.city.as_deref().unwrap_or_default();
    let state = address.state.as_deref().unwrap_or_default();
    let postal = address.postal_code.as_deref().unwrap_or_default();

    let formatted = format!("{line}, {city}, {state} {postal}");
    let trimmed = trim_separators(&formatted);

    if trimmed.is_empty() {
        NO_ADDRESS.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Strip leading and trailing `", "` separators (and stray whitespace) left by empty parts.
fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c: char| c == ',' || c.is_whitespace())
}
