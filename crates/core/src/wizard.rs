//! The claim wizard.
//!
//! A claim moves through four steps in strict order:
//!
//! ```text
//! SelectEncounter -> AddDetails -> ReviewAndJustify -> Submitted
//! ```
//!
//! Backward navigation is allowed from `AddDetails` and `ReviewAndJustify` only. `Submitted` is
//! terminal; the owning session resets to leave it.
//!
//! The two text-generation calls (summary and justification) run outside the wizard. Starting one
//! hands out a [`GenerationTicket`]; the result is applied with the same ticket and is ignored if
//! the wizard has moved on since (another ticket issued, or the step left).

use crate::claim::Claim;
use crate::constants::{JUSTIFICATION_FAILED_MESSAGE, SUMMARY_FAILED_MESSAGE};
use crate::generation::AiError;
use crate::lookup::PatientRecord;
use crate::{ClaimError, ClaimResult};
use fhir::{Condition, Encounter, Patient, PatientData, Procedure};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Wizard steps, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    SelectEncounter,
    AddDetails,
    ReviewAndJustify,
    Submitted,
}

impl WizardStep {
    /// One-based position, as shown in a step indicator.
    pub fn number(self) -> u8 {
        match self {
            WizardStep::SelectEncounter => 1,
            WizardStep::AddDetails => 2,
            WizardStep::ReviewAndJustify => 3,
            WizardStep::Submitted => 4,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::SelectEncounter => "Select Encounter",
            WizardStep::AddDetails => "Add Details",
            WizardStep::ReviewAndJustify => "Review & Justify",
            WizardStep::Submitted => "Submitted",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Records addressable by identifier.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Encounter {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Condition {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Procedure {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Order-preserving set of records keyed by identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection<T> {
    items: Vec<T>,
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Identified> Selection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `item` if an item with its id is present, otherwise append it.
    ///
    /// Returns `true` if the item is selected afterwards.
    pub fn toggle(&mut self, item: T) -> bool {
        match self.items.iter().position(|i| i.id() == item.id()) {
            Some(index) => {
                self.items.remove(index);
                false
            }
            None => {
                self.items.push(item);
                true
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id() == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(Identified::id).collect()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// GENERATION
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GenerationKind {
    Summary,
    Justification,
}

/// Authorises applying one generation result to the wizard that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GenerationTicket {
    wizard: Uuid,
    kind: GenerationKind,
    token: u64,
}

impl GenerationTicket {
    pub fn kind(&self) -> GenerationKind {
        self.kind
    }
}

/// Progress of one generated text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum GenerationState {
    #[default]
    Idle,
    Pending,
    Ready(String),
    /// Carries the message shown to the user.
    Failed(String),
}

impl GenerationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, GenerationState::Pending)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationState::Ready(text) => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            GenerationState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

// ============================================================================
// WIZARD
// ============================================================================

/// Wizard state for one patient.
#[derive(Clone, Debug)]
pub struct ClaimWizard {
    id: Uuid,
    record: PatientRecord,
    step: WizardStep,
    encounter: Option<Encounter>,
    conditions: Selection<Condition>,
    procedures: Selection<Procedure>,
    summary: GenerationState,
    justification: GenerationState,
    summary_ticket: Option<GenerationTicket>,
    justification_ticket: Option<GenerationTicket>,
    last_token: u64,
}

impl ClaimWizard {
    pub fn new(record: PatientRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
            step: WizardStep::SelectEncounter,
            encounter: None,
            conditions: Selection::new(),
            procedures: Selection::new(),
            summary: GenerationState::Idle,
            justification: GenerationState::Idle,
            summary_ticket: None,
            justification_ticket: None,
            last_token: 0,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn record(&self) -> &PatientRecord {
        &self.record
    }

    pub fn patient(&self) -> &Patient {
        &self.record.patient
    }

    pub fn data(&self) -> &PatientData {
        &self.record.data
    }

    pub fn encounter(&self) -> Option<&Encounter> {
        self.encounter.as_ref()
    }

    pub fn selected_conditions(&self) -> &Selection<Condition> {
        &self.conditions
    }

    pub fn selected_procedures(&self) -> &Selection<Procedure> {
        &self.procedures
    }

    pub fn summary(&self) -> &GenerationState {
        &self.summary
    }

    pub fn justification(&self) -> &GenerationState {
        &self.justification
    }

    /// Copies of the current selections, as input for text generation.
    pub fn generation_input(&self) -> (Vec<Condition>, Vec<Procedure>) {
        (
            self.conditions.items().to_vec(),
            self.procedures.items().to_vec(),
        )
    }

    /// Choose the encounter the claim is for.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::InvalidTransition`] outside `SelectEncounter`.
    /// - [`ClaimError::UnknownItem`] if the patient has no encounter `id`.
    pub fn select_encounter(&mut self, id: &str) -> ClaimResult<()> {
        self.require(WizardStep::SelectEncounter, "select an encounter")?;

        let encounter = find(&self.record.data.encounters, "encounter", id)?;
        tracing::debug!("encounter {id} selected");
        self.encounter = Some(encounter);
        self.step = WizardStep::AddDetails;
        Ok(())
    }

    /// Go back one step.
    ///
    /// Leaving the review step discards the summary and justification state so the summary is
    /// generated again on the next review. Results still in flight are ignored when they arrive.
    pub fn back(&mut self) -> ClaimResult<WizardStep> {
        match self.step {
            WizardStep::AddDetails => {
                self.encounter = None;
                self.step = WizardStep::SelectEncounter;
            }
            WizardStep::ReviewAndJustify => {
                self.summary = GenerationState::Idle;
                self.justification = GenerationState::Idle;
                self.summary_ticket = None;
                self.justification_ticket = None;
                self.step = WizardStep::AddDetails;
            }
            step => {
                return Err(ClaimError::InvalidTransition {
                    step,
                    action: "go back",
                })
            }
        }
        Ok(self.step)
    }

    /// Add or remove a diagnosis. Returns `true` if it is selected afterwards.
    pub fn toggle_condition(&mut self, id: &str) -> ClaimResult<bool> {
        self.require(WizardStep::AddDetails, "change diagnoses")?;
        let condition = find(&self.record.data.conditions, "condition", id)?;
        Ok(self.conditions.toggle(condition))
    }

    /// Add or remove a procedure. Returns `true` if it is selected afterwards.
    pub fn toggle_procedure(&mut self, id: &str) -> ClaimResult<bool> {
        self.require(WizardStep::AddDetails, "change procedures")?;
        let procedure = find(&self.record.data.procedures, "procedure", id)?;
        Ok(self.procedures.toggle(procedure))
    }

    /// Whether [`ClaimWizard::review`] would advance from `AddDetails`.
    pub fn can_review(&self) -> bool {
        self.step == WizardStep::AddDetails
            && !self.conditions.is_empty()
            && !self.procedures.is_empty()
    }

    /// Enter the review step.
    ///
    /// Returns a summary ticket when a summary has to be generated, which is only the case when
    /// none is cached, pending or failed for this visit to the review step. Calling this again
    /// while already reviewing is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::InvalidTransition`] outside `AddDetails` and `ReviewAndJustify`.
    /// - [`ClaimError::InvalidInput`] unless at least one diagnosis and one procedure are
    ///   selected.
    pub fn review(&mut self) -> ClaimResult<Option<GenerationTicket>> {
        match self.step {
            WizardStep::ReviewAndJustify => return Ok(None),
            WizardStep::AddDetails => {}
            step => {
                return Err(ClaimError::InvalidTransition {
                    step,
                    action: "review",
                })
            }
        }

        if !self.can_review() {
            return Err(ClaimError::InvalidInput(
                "select at least one diagnosis and one procedure".into(),
            ));
        }

        self.step = WizardStep::ReviewAndJustify;

        if self.summary != GenerationState::Idle || self.summary_ticket.is_some() {
            return Ok(None);
        }

        let ticket = self.issue(GenerationKind::Summary);
        self.summary = GenerationState::Pending;
        self.summary_ticket = Some(ticket);
        Ok(Some(ticket))
    }

    /// Apply a generated summary. Returns `false` if the ticket is stale.
    pub fn complete_summary(&mut self, ticket: GenerationTicket, text: String) -> bool {
        if !self.redeem(ticket) {
            return false;
        }
        self.summary = GenerationState::Ready(text);
        true
    }

    /// Record a failed summary. Returns `false` if the ticket is stale.
    pub fn fail_summary(&mut self, ticket: GenerationTicket, err: &AiError) -> bool {
        if !self.redeem(ticket) {
            return false;
        }
        tracing::warn!("summary generation failed: {err}");
        self.summary = GenerationState::Failed(SUMMARY_FAILED_MESSAGE.to_string());
        true
    }

    /// Start generating the justification.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::InvalidTransition`] outside `ReviewAndJustify`.
    /// - [`ClaimError::Busy`] while the summary or a justification is pending. A failed summary
    ///   does not block.
    pub fn request_justification(&mut self) -> ClaimResult<GenerationTicket> {
        self.require(WizardStep::ReviewAndJustify, "generate a justification")?;
        if self.summary.is_pending() {
            return Err(ClaimError::Busy("summary"));
        }
        if self.justification_ticket.is_some() {
            return Err(ClaimError::Busy("justification"));
        }

        let ticket = self.issue(GenerationKind::Justification);
        self.justification = GenerationState::Pending;
        self.justification_ticket = Some(ticket);
        Ok(ticket)
    }

    /// Apply a generated justification and submit the claim. Returns `false` if the ticket is
    /// stale.
    pub fn complete_justification(&mut self, ticket: GenerationTicket, text: String) -> bool {
        if !self.redeem(ticket) {
            return false;
        }
        self.justification = GenerationState::Ready(text);
        self.step = WizardStep::Submitted;
        tracing::info!("claim submitted for patient {}", self.record.patient.id);
        true
    }

    /// Record a failed justification; the user may retry. Returns `false` if the ticket is stale.
    pub fn fail_justification(&mut self, ticket: GenerationTicket, err: &AiError) -> bool {
        if !self.redeem(ticket) {
            return false;
        }
        tracing::warn!("justification generation failed: {err}");
        self.justification = GenerationState::Failed(JUSTIFICATION_FAILED_MESSAGE.to_string());
        true
    }

    /// The submitted claim, once the wizard reaches `Submitted`.
    pub fn claim(&self) -> Option<Claim> {
        if self.step != WizardStep::Submitted {
            return None;
        }
        let encounter = self.encounter.as_ref()?;
        let justification = self.justification.text()?;

        Some(Claim {
            patient_id: self.record.patient.id.clone(),
            encounter_id: encounter.id.clone(),
            diagnoses: self.conditions.items().to_vec(),
            procedures: self.procedures.items().to_vec(),
            clinical_justification: justification.to_string(),
        })
    }

    fn require(&self, step: WizardStep, action: &'static str) -> ClaimResult<()> {
        if self.step == step {
            Ok(())
        } else {
            Err(ClaimError::InvalidTransition {
                step: self.step,
                action,
            })
        }
    }

    fn issue(&mut self, kind: GenerationKind) -> GenerationTicket {
        self.last_token += 1;
        GenerationTicket {
            wizard: self.id,
            kind,
            token: self.last_token,
        }
    }

    /// Consume the in-flight ticket if `ticket` is it.
    fn redeem(&mut self, ticket: GenerationTicket) -> bool {
        let slot = match ticket.kind {
            GenerationKind::Summary => &mut self.summary_ticket,
            GenerationKind::Justification => &mut self.justification_ticket,
        };
        if self.step != WizardStep::ReviewAndJustify || *slot != Some(ticket) {
            tracing::debug!("ignoring stale {:?} result", ticket.kind);
            return false;
        }
        *slot = None;
        true
    }
}

fn find<T: Identified + Clone>(items: &[T], kind: &'static str, id: &str) -> ClaimResult<T> {
    items
        .iter()
        .find(|i| i.id() == id)
        .cloned()
        .ok_or_else(|| ClaimError::UnknownItem {
            kind,
            id: id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::Gender;

    fn record() -> PatientRecord {
        PatientRecord {
            patient: Patient {
                id: "12345".into(),
                name: "John Appleseed".into(),
                birth_date: "1985-04-12".into(),
                gender: Gender::Male,
                address: "123 Main St, Anytown, MA 01234".into(),
            },
            data: PatientData {
                encounters: vec![
                    Encounter {
                        id: "enc1".into(),
                        date: "2023-10-26".into(),
                        kind: "Office Visit".into(),
                        practitioner: "Dr. Emily Carter".into(),
                    },
                    Encounter {
                        id: "enc2".into(),
                        date: "2023-08-15".into(),
                        kind: "Follow-up".into(),
                        practitioner: "Dr. Emily Carter".into(),
                    },
                ],
                conditions: vec![
                    Condition {
                        id: "cond1".into(),
                        code: "J02.9".into(),
                        description: "Acute pharyngitis, unspecified".into(),
                    },
                    Condition {
                        id: "cond2".into(),
                        code: "R05".into(),
                        description: "Cough".into(),
                    },
                    Condition {
                        id: "cond3".into(),
                        code: "I10".into(),
                        description: "Essential (primary) hypertension".into(),
                    },
                ],
                procedures: vec![
                    Procedure {
                        id: "proc1".into(),
                        code: "99213".into(),
                        description: "Office visit, established patient".into(),
                    },
                    Procedure {
                        id: "proc2".into(),
                        code: "87880".into(),
                        description: "Rapid strep test".into(),
                    },
                ],
            },
        }
    }

    /// Wizard in `AddDetails` with one diagnosis and one procedure selected.
    fn ready_for_review() -> ClaimWizard {
        let mut wizard = ClaimWizard::new(record());
        wizard.select_encounter("enc1").expect("select encounter");
        wizard.toggle_condition("cond1").expect("toggle condition");
        wizard.toggle_procedure("proc2").expect("toggle procedure");
        wizard
    }

    fn reviewing() -> (ClaimWizard, GenerationTicket) {
        let mut wizard = ready_for_review();
        let ticket = wizard
            .review()
            .expect("review should succeed")
            .expect("summary should be requested");
        (wizard, ticket)
    }

    /// Wizard in `ReviewAndJustify` with the summary generated.
    fn summarised() -> ClaimWizard {
        let (mut wizard, ticket) = reviewing();
        assert!(wizard.complete_summary(ticket, "summary".into()));
        wizard
    }

    #[test]
    fn test_new_wizard_starts_at_select_encounter() {
        let wizard = ClaimWizard::new(record());
        assert_eq!(wizard.step(), WizardStep::SelectEncounter);
        assert!(wizard.encounter().is_none());
        assert!(wizard.claim().is_none());
    }

    #[test]
    fn test_select_encounter_advances() {
        let mut wizard = ClaimWizard::new(record());
        wizard.select_encounter("enc2").expect("select encounter");
        assert_eq!(wizard.step(), WizardStep::AddDetails);
        assert_eq!(wizard.encounter().map(|e| e.id.as_str()), Some("enc2"));
    }

    #[test]
    fn test_select_unknown_encounter_is_rejected() {
        let mut wizard = ClaimWizard::new(record());
        let err = wizard.select_encounter("nope").expect_err("should reject");
        assert!(matches!(err, ClaimError::UnknownItem { kind: "encounter", .. }));
        assert_eq!(wizard.step(), WizardStep::SelectEncounter);
    }

    #[test]
    fn test_encounter_is_fixed_after_selection() {
        let mut wizard = ClaimWizard::new(record());
        wizard.select_encounter("enc1").expect("select encounter");
        let err = wizard.select_encounter("enc2").expect_err("should reject");
        assert!(matches!(
            err,
            ClaimError::InvalidTransition {
                step: WizardStep::AddDetails,
                ..
            }
        ));
    }

    #[test]
    fn test_back_from_add_details_allows_reselection() {
        let mut wizard = ClaimWizard::new(record());
        wizard.select_encounter("enc1").expect("select encounter");
        assert_eq!(wizard.back().expect("back"), WizardStep::SelectEncounter);
        wizard.select_encounter("enc2").expect("reselect encounter");
        assert_eq!(wizard.encounter().map(|e| e.id.as_str()), Some("enc2"));
    }

    #[test]
    fn test_back_is_rejected_at_first_step() {
        let mut wizard = ClaimWizard::new(record());
        assert!(matches!(
            wizard.back(),
            Err(ClaimError::InvalidTransition { action: "go back", .. })
        ));
    }

    #[test]
    fn test_toggle_twice_restores_selection_and_order() {
        let mut wizard = ClaimWizard::new(record());
        wizard.select_encounter("enc1").expect("select encounter");
        wizard.toggle_condition("cond3").expect("toggle");
        wizard.toggle_condition("cond1").expect("toggle");
        let before = wizard.selected_conditions().clone();

        assert!(wizard.toggle_condition("cond2").expect("toggle"));
        assert!(!wizard.toggle_condition("cond2").expect("toggle"));

        assert_eq!(wizard.selected_conditions(), &before);
        assert_eq!(wizard.selected_conditions().ids(), ["cond3", "cond1"]);
    }

    #[test]
    fn test_toggle_unknown_item_is_rejected() {
        let mut wizard = ClaimWizard::new(record());
        wizard.select_encounter("enc1").expect("select encounter");
        assert!(matches!(
            wizard.toggle_procedure("proc9"),
            Err(ClaimError::UnknownItem { kind: "procedure", .. })
        ));
    }

    #[test]
    fn test_review_blocked_iff_a_selection_is_empty() {
        let mut wizard = ClaimWizard::new(record());
        wizard.select_encounter("enc1").expect("select encounter");

        for (condition, procedure, allowed) in [
            (false, false, false),
            (true, false, false),
            (false, true, false),
            (true, true, true),
        ] {
            let mut w = wizard.clone();
            if condition {
                w.toggle_condition("cond1").expect("toggle");
            }
            if procedure {
                w.toggle_procedure("proc1").expect("toggle");
            }
            assert_eq!(w.can_review(), allowed);
            assert_eq!(w.review().is_ok(), allowed);
            let expected = if allowed {
                WizardStep::ReviewAndJustify
            } else {
                WizardStep::AddDetails
            };
            assert_eq!(w.step(), expected);
        }
    }

    #[test]
    fn test_review_requests_summary_once() {
        let (mut wizard, ticket) = reviewing();
        assert_eq!(ticket.kind(), GenerationKind::Summary);
        assert!(wizard.summary().is_pending());

        assert_eq!(wizard.review().expect("review again"), None);
        assert!(wizard.complete_summary(ticket, "summary".into()));
        assert_eq!(wizard.review().expect("review again"), None);
        assert_eq!(wizard.summary().text(), Some("summary"));
    }

    #[test]
    fn test_summary_failure_is_not_fatal() {
        let (mut wizard, ticket) = reviewing();
        assert!(wizard.fail_summary(ticket, &AiError::MissingApiKey));
        assert_eq!(wizard.summary().error(), Some(SUMMARY_FAILED_MESSAGE));
        assert_eq!(wizard.review().expect("review again"), None);

        let ticket = wizard.request_justification().expect("justification allowed");
        assert!(wizard.complete_justification(ticket, "justified".into()));
        assert_eq!(wizard.step(), WizardStep::Submitted);
    }

    #[test]
    fn test_back_from_review_clears_summary_and_regenerates() {
        let (mut wizard, ticket) = reviewing();
        assert!(wizard.complete_summary(ticket, "summary".into()));

        assert_eq!(wizard.back().expect("back"), WizardStep::AddDetails);
        assert_eq!(wizard.summary(), &GenerationState::Idle);

        let again = wizard.review().expect("review").expect("summary requested again");
        assert_ne!(again, ticket);
    }

    #[test]
    fn test_stale_summary_is_ignored() {
        let (mut wizard, old) = reviewing();
        wizard.back().expect("back");
        assert!(!wizard.complete_summary(old, "late".into()));
        assert_eq!(wizard.summary(), &GenerationState::Idle);

        let fresh = wizard.review().expect("review").expect("summary requested");
        assert!(!wizard.complete_summary(old, "late".into()));
        assert!(wizard.summary().is_pending());
        assert!(wizard.complete_summary(fresh, "fresh".into()));
        assert_eq!(wizard.summary().text(), Some("fresh"));
    }

    #[test]
    fn test_justification_waits_for_pending_summary() {
        let (mut wizard, ticket) = reviewing();
        assert!(matches!(
            wizard.request_justification(),
            Err(ClaimError::Busy("summary"))
        ));
        assert_eq!(wizard.justification(), &GenerationState::Idle);

        assert!(wizard.complete_summary(ticket, "summary".into()));
        wizard.request_justification().expect("justification allowed once summarised");
    }

    #[test]
    fn test_justification_rejected_while_pending() {
        let mut wizard = summarised();
        wizard.request_justification().expect("first request");
        assert!(matches!(
            wizard.request_justification(),
            Err(ClaimError::Busy("justification"))
        ));
    }

    #[test]
    fn test_justification_failure_allows_retry() {
        let mut wizard = summarised();
        let ticket = wizard.request_justification().expect("request");
        assert!(wizard.fail_justification(ticket, &AiError::EmptyResponse));
        assert_eq!(wizard.step(), WizardStep::ReviewAndJustify);
        assert_eq!(
            wizard.justification().error(),
            Some(JUSTIFICATION_FAILED_MESSAGE)
        );

        let retry = wizard.request_justification().expect("retry");
        assert!(wizard.complete_justification(retry, "justified".into()));
        assert_eq!(wizard.step(), WizardStep::Submitted);
    }

    #[test]
    fn test_stale_justification_does_not_submit() {
        let mut wizard = summarised();
        let ticket = wizard.request_justification().expect("request");
        wizard.back().expect("back");
        assert!(!wizard.complete_justification(ticket, "late".into()));
        assert_eq!(wizard.step(), WizardStep::AddDetails);
    }

    #[test]
    fn test_submitted_is_terminal_and_yields_claim() {
        let mut wizard = summarised();
        let ticket = wizard.request_justification().expect("request");
        assert!(wizard.complete_justification(ticket, "justified".into()));

        assert!(wizard.back().is_err());
        assert!(wizard.toggle_condition("cond2").is_err());
        assert!(wizard.review().is_err());
        assert!(wizard.request_justification().is_err());

        let claim = wizard.claim().expect("claim should be available");
        assert_eq!(claim.patient_id, "12345");
        assert_eq!(claim.encounter_id, "enc1");
        assert_eq!(claim.diagnoses.len(), 1);
        assert_eq!(claim.procedures[0].code, "87880");
        assert_eq!(claim.clinical_justification, "justified");
    }

    #[test]
    fn test_ticket_from_another_wizard_is_ignored() {
        let (_, foreign) = reviewing();
        let (mut wizard, own) = reviewing();
        assert!(!wizard.complete_summary(foreign, "foreign".into()));
        assert!(wizard.complete_summary(own, "own".into()));
    }

    #[test]
    fn test_step_display_and_numbering() {
        assert_eq!(WizardStep::ReviewAndJustify.to_string(), "Review & Justify");
        assert_eq!(WizardStep::Submitted.number(), 4);
    }
}
