//! FHIR wire/boundary support for the claim submitter.
//!
//! This crate provides **wire models** and **translation helpers** for the FHIR resources the
//! claim workflow reads from an EHR:
//! - Patient demographics
//! - Encounters, Conditions and Procedures
//! - Search-result Bundles (for example the output of `Patient/$everything`)
//!
//! This crate focuses on:
//! - serialisation/deserialisation of the JSON resources the server returns
//! - translation between FHIR wire structs and flat domain records
//! - defaulting of optional fields so that downstream code never sees a missing value
//!
//! It performs no I/O. Fetching resources is the job of the `claim-core` collaborators.

pub mod bundle;
pub mod clinical;
pub mod id;
pub mod patient;

mod lenient;

// Re-export facades
pub use bundle::{append_entries, next_page_link, parse_bundle, parse_bundle_str};
pub use clinical::{Condition, Encounter, Procedure};
pub use id::PatientId;
pub use patient::{Gender, Patient};

// Re-export public domain-level types
pub use bundle::{ParsedBundle, PatientData, ResourceKind};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
