//! Request and response bodies.
//!
//! Responses are flattened snapshots of the session built under the session lock. Everything a
//! front-end needs to render the current screen is in [`SessionView`].

use chrono::NaiveDate;
use claim_core::{Claim, ClaimWizard, GenerationState, Session, SessionState, WizardStep};
use fhir::{Condition, Encounter, Patient, Procedure};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchReq {
    pub patient_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectEncounterReq {
    pub encounter_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Search,
    Loading,
    Active,
}

/// Snapshot of the whole session.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: SessionStatus,
    /// Message from the last failed lookup or login.
    pub error: Option<String>,
    pub smart_enabled: bool,
    pub login_pending: bool,
    pub claim: Option<ClaimView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    /// One-based position.
    pub number: u8,
    pub name: String,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientView {
    pub id: String,
    pub name: String,
    pub birth_date: String,
    pub age: Option<u32>,
    /// Display label, e.g. "Female".
    pub gender: String,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncounterView {
    pub id: String,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub practitioner: String,
}

/// A diagnosis or procedure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodedItemView {
    pub id: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationView {
    /// One of `idle`, `pending`, `ready`, `failed`.
    pub status: String,
    pub text: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedClaimView {
    pub patient_id: String,
    pub encounter_id: String,
    pub diagnoses: Vec<CodedItemView>,
    pub procedures: Vec<CodedItemView>,
    pub clinical_justification: String,
    pub clipboard_text: String,
}

/// The claim being worked on.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimView {
    pub step: StepView,
    pub patient: PatientView,
    pub encounters: Vec<EncounterView>,
    pub conditions: Vec<CodedItemView>,
    pub procedures: Vec<CodedItemView>,
    pub selected_encounter_id: Option<String>,
    pub selected_condition_ids: Vec<String>,
    pub selected_procedure_ids: Vec<String>,
    pub can_review: bool,
    pub summary: GenerationView,
    pub justification: GenerationView,
    pub submitted: Option<SubmittedClaimView>,
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl SessionView {
    /// Snapshot `session`. `today` is used for the patient's age.
    pub fn build(session: &Session, smart_enabled: bool, today: NaiveDate) -> Self {
        let (status, error, claim) = match session.state() {
            SessionState::Search { error } => (SessionStatus::Search, error.clone(), None),
            SessionState::Loading => (SessionStatus::Loading, None, None),
            SessionState::Active(wizard) => (
                SessionStatus::Active,
                None,
                Some(ClaimView::build(wizard, today)),
            ),
        };

        Self {
            status,
            error,
            smart_enabled,
            login_pending: session.is_login_pending(),
            claim,
        }
    }
}

impl ClaimView {
    fn build(wizard: &ClaimWizard, today: NaiveDate) -> Self {
        let data = wizard.data();
        Self {
            step: wizard.step().into(),
            patient: PatientView::build(wizard.patient(), today),
            encounters: data.encounters.iter().map(EncounterView::from).collect(),
            conditions: data.conditions.iter().map(CodedItemView::from).collect(),
            procedures: data.procedures.iter().map(CodedItemView::from).collect(),
            selected_encounter_id: wizard.encounter().map(|e| e.id.clone()),
            selected_condition_ids: owned(wizard.selected_conditions().ids()),
            selected_procedure_ids: owned(wizard.selected_procedures().ids()),
            can_review: wizard.can_review(),
            summary: wizard.summary().into(),
            justification: wizard.justification().into(),
            submitted: wizard.claim().map(SubmittedClaimView::from),
        }
    }
}

impl PatientView {
    fn build(patient: &Patient, today: NaiveDate) -> Self {
        Self {
            id: patient.id.clone(),
            name: patient.name.clone(),
            birth_date: patient.birth_date.clone(),
            age: patient.age_on(today),
            gender: patient.gender.label().to_string(),
            address: patient.address.clone(),
        }
    }
}

impl From<WizardStep> for StepView {
    fn from(step: WizardStep) -> Self {
        let name = match step {
            WizardStep::SelectEncounter => "selectEncounter",
            WizardStep::AddDetails => "addDetails",
            WizardStep::ReviewAndJustify => "reviewAndJustify",
            WizardStep::Submitted => "submitted",
        };
        Self {
            number: step.number(),
            name: name.into(),
            title: step.title().into(),
        }
    }
}

impl From<&Encounter> for EncounterView {
    fn from(e: &Encounter) -> Self {
        Self {
            id: e.id.clone(),
            date: e.date.clone(),
            kind: e.kind.clone(),
            practitioner: e.practitioner.clone(),
        }
    }
}

impl From<&Condition> for CodedItemView {
    fn from(c: &Condition) -> Self {
        Self {
            id: c.id.clone(),
            code: c.code.clone(),
            description: c.description.clone(),
        }
    }
}

impl From<&Procedure> for CodedItemView {
    fn from(p: &Procedure) -> Self {
        Self {
            id: p.id.clone(),
            code: p.code.clone(),
            description: p.description.clone(),
        }
    }
}

impl From<&GenerationState> for GenerationView {
    fn from(state: &GenerationState) -> Self {
        let status = match state {
            GenerationState::Idle => "idle",
            GenerationState::Pending => "pending",
            GenerationState::Ready(_) => "ready",
            GenerationState::Failed(_) => "failed",
        };
        Self {
            status: status.into(),
            text: state.text().map(str::to_string),
            error: state.error().map(str::to_string),
        }
    }
}

impl From<Claim> for SubmittedClaimView {
    fn from(claim: Claim) -> Self {
        Self {
            clipboard_text: claim.clipboard_text().to_string(),
            patient_id: claim.patient_id,
            encounter_id: claim.encounter_id,
            diagnoses: claim.diagnoses.iter().map(CodedItemView::from).collect(),
            procedures: claim.procedures.iter().map(CodedItemView::from).collect(),
            clinical_justification: claim.clinical_justification,
        }
    }
}

fn owned(ids: Vec<&str>) -> Vec<String> {
    ids.into_iter().map(str::to_string).collect()
}
