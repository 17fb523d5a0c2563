//! # Claim Core
//!
//! Core business logic for the clinical claim wizard.
//!
//! This crate holds the claim workflow and its collaborators:
//! - FHIR server access (`$everything`, direct Patient reads, launch context)
//! - SMART App Launch authorisation
//! - Generated clinical text (summary and justification)
//! - Patient lookup with the direct-read fallback
//! - The claim wizard state machine and the session that owns it
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and `cli`.
//! Configuration is resolved by binaries at startup and passed in; nothing here reads the
//! process environment.

pub mod claim;
pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod fhir_client;
pub mod generation;
pub mod lookup;
pub mod session;
pub mod smart;
pub mod wizard;

#[cfg(test)]
mod test_support;

pub use claim::Claim;
pub use config::{AiConfig, CoreConfig, SmartConfig};
pub use driver::ClaimDriver;
pub use error::{ClaimError, ClaimResult};
pub use fhir_client::{FhirClient, FhirClientError, HttpFhirClient, StaticFhirClient};
pub use generation::{AiError, CannedTextGenerator, ClaimWriter, GeminiClient, TextGenerator};
pub use lookup::{load_current_patient, load_patient, PatientRecord};
pub use session::{LookupTicket, Session, SessionState};
pub use smart::{AuthError, CallbackParams, PendingAuthorization, SmartLauncher};
pub use wizard::{
    ClaimWizard, GenerationKind, GenerationState, GenerationTicket, Selection, WizardStep,
};
