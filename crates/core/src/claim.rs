use fhir::{Condition, Procedure};
use serde::Serialize;

/// A submitted claim.
///
/// Claims only exist in memory: submitting shows the claim to the user, it is never stored or
/// sent anywhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub patient_id: String,
    pub encounter_id: String,
    pub diagnoses: Vec<Condition>,
    pub procedures: Vec<Procedure>,
    pub clinical_justification: String,
}

impl Claim {
    /// Text offered for copying to the clipboard.
    pub fn clipboard_text(&self) -> &str {
        &self.clinical_justification
    }
}
