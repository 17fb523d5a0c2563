//! Sequential driver for a whole claim.
//!
//! [`ClaimDriver`] owns a [`Session`] outright and awaits every collaborator call in line. It is
//! the flow used by the command line and by end-to-end tests; servers that share a session
//! between requests apply the same session operations around their own locking.

use crate::claim::Claim;
use crate::generation::ClaimWriter;
use crate::lookup::{load_current_patient, load_patient, PatientRecord};
use crate::session::Session;
use crate::wizard::{ClaimWizard, GenerationState, WizardStep};
use crate::{ClaimError, ClaimResult};
use fhir::PatientId;

#[derive(Debug)]
pub struct ClaimDriver {
    session: Session,
    writer: ClaimWriter,
}

impl ClaimDriver {
    pub fn new(session: Session, writer: ClaimWriter) -> Self {
        Self { session, writer }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn wizard(&self) -> ClaimResult<&ClaimWizard> {
        self.session.wizard()
    }

    /// Look up a patient by the id the user typed and open a claim for them.
    ///
    /// # Errors
    ///
    /// [`ClaimError::InvalidInput`] for a blank id, otherwise the lookup failure. A failed lookup
    /// leaves the session in search with the failure's message.
    pub async fn search(&mut self, input: &str) -> ClaimResult<&PatientRecord> {
        let id = PatientId::new(input).map_err(|e| ClaimError::InvalidInput(e.to_string()))?;
        let ticket = self.session.begin_lookup()?;
        let client = self.session.client();

        match load_patient(client.as_ref(), &id).await {
            Ok(record) => {
                self.session.finish_lookup(ticket, record);
            }
            Err(err) => {
                self.session.fail_lookup(ticket, &err);
                return Err(err);
            }
        }
        Ok(self.session.wizard()?.record())
    }

    /// Open a claim for the patient in the current client's launch context.
    pub async fn open_current_patient(&mut self) -> ClaimResult<&PatientRecord> {
        let ticket = self.session.begin_lookup()?;
        let client = self.session.client();

        match load_current_patient(client.as_ref()).await {
            Ok(record) => {
                self.session.finish_lookup(ticket, record);
            }
            Err(err) => {
                self.session.fail_lookup(ticket, &err);
                return Err(err);
            }
        }
        Ok(self.session.wizard()?.record())
    }

    pub fn select_encounter(&mut self, id: &str) -> ClaimResult<()> {
        self.session.wizard_mut()?.select_encounter(id)
    }

    pub fn toggle_condition(&mut self, id: &str) -> ClaimResult<bool> {
        self.session.wizard_mut()?.toggle_condition(id)
    }

    pub fn toggle_procedure(&mut self, id: &str) -> ClaimResult<bool> {
        self.session.wizard_mut()?.toggle_procedure(id)
    }

    pub fn back(&mut self) -> ClaimResult<WizardStep> {
        self.session.wizard_mut()?.back()
    }

    /// Enter review and generate the summary if one is needed.
    ///
    /// A failed summary is not an error: it is recorded on the wizard and the claim can proceed.
    pub async fn review(&mut self) -> ClaimResult<&GenerationState> {
        let wizard = self.session.wizard_mut()?;
        if let Some(ticket) = wizard.review()? {
            let (diagnoses, procedures) = wizard.generation_input();
            match self.writer.patient_summary(&diagnoses, &procedures).await {
                Ok(text) => {
                    self.session.wizard_mut()?.complete_summary(ticket, text);
                }
                Err(err) => {
                    self.session.wizard_mut()?.fail_summary(ticket, &err);
                }
            }
        }
        Ok(self.session.wizard()?.summary())
    }

    /// Generate the justification and submit the claim.
    ///
    /// # Errors
    ///
    /// [`ClaimError::Justification`] if generation fails; the wizard stays on review and the call
    /// may be retried.
    pub async fn justify(&mut self) -> ClaimResult<Claim> {
        let wizard = self.session.wizard_mut()?;
        let ticket = wizard.request_justification()?;
        let (diagnoses, procedures) = wizard.generation_input();

        match self
            .writer
            .clinical_justification(&diagnoses, &procedures)
            .await
        {
            Ok(text) => {
                let wizard = self.session.wizard_mut()?;
                wizard.complete_justification(ticket, text);
                wizard.claim().ok_or(ClaimError::InvalidTransition {
                    step: wizard.step(),
                    action: "submit the claim",
                })
            }
            Err(err) => {
                self.session.wizard_mut()?.fail_justification(ticket, &err);
                Err(ClaimError::Justification(err))
            }
        }
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SUMMARY_FAILED_MESSAGE;
    use crate::fhir_client::StaticFhirClient;
    use crate::generation::{AiError, CannedTextGenerator, TextGenerator, CANNED_SUMMARY};
    use crate::session::SessionState;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample_bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                { "resource": {
                    "resourceType": "Patient", "id": "12345",
                    "name": [{ "given": ["John"], "family": "Appleseed" }],
                    "birthDate": "1985-04-12", "gender": "male",
                    "address": [{ "line": ["123 Main St"], "city": "Anytown", "state": "MA", "postalCode": "01234" }]
                }},
                { "resource": {
                    "resourceType": "Encounter", "id": "enc2",
                    "period": { "start": "2023-08-15T09:00:00Z" },
                    "type": [{ "text": "Follow-up" }],
                    "participant": [{ "individual": { "display": "Dr. Emily Carter" } }]
                }},
                { "resource": {
                    "resourceType": "Encounter", "id": "enc1",
                    "period": { "start": "2023-10-26T10:30:00Z" },
                    "type": [{ "text": "Office Visit" }]
                }},
                { "resource": {
                    "resourceType": "Condition", "id": "cond1",
                    "code": { "coding": [{ "code": "J02.9" }], "text": "Acute pharyngitis, unspecified" }
                }},
                { "resource": {
                    "resourceType": "Procedure", "id": "proc2",
                    "code": { "coding": [{ "code": "87880", "display": "Rapid strep test" }] }
                }},
                { "resource": { "resourceType": "Observation", "id": "obs1" } }
            ]
        })
    }

    fn driver_with(generator: Arc<dyn TextGenerator>) -> ClaimDriver {
        let id = PatientId::new("12345").expect("valid patient id");
        let client = StaticFhirClient::new().with_bundle(&id, sample_bundle());
        ClaimDriver::new(
            Session::new(Arc::new(client)),
            ClaimWriter::new(generator),
        )
    }

    /// Fails the first `failures` calls, then answers with fixed text.
    struct FlakyGenerator {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for FlakyGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, AiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AiError::EmptyResponse)
            } else {
                Ok("Medically necessary.".into())
            }
        }
    }

    #[tokio::test]
    async fn test_full_claim_flow() {
        let mut driver = driver_with(Arc::new(CannedTextGenerator));

        let record = driver.search("  12345 ").await.expect("search should succeed");
        assert_eq!(record.patient.name, "John Appleseed");
        assert_eq!(record.data.encounters[0].id, "enc1");

        driver.select_encounter("enc1").expect("select encounter");
        driver.toggle_condition("cond1").expect("toggle condition");
        driver.toggle_procedure("proc2").expect("toggle procedure");

        let summary = driver.review().await.expect("review should succeed");
        assert_eq!(summary.text(), Some(CANNED_SUMMARY));

        let claim = driver.justify().await.expect("justification should succeed");
        assert_eq!(claim.encounter_id, "enc1");
        assert_eq!(claim.diagnoses[0].code, "J02.9");
        assert_eq!(claim.procedures[0].description, "Rapid strep test");
        assert_eq!(
            driver.wizard().expect("wizard").step(),
            WizardStep::Submitted
        );

        driver.reset();
        assert!(matches!(
            driver.session().state(),
            SessionState::Search { error: None }
        ));
    }

    #[tokio::test]
    async fn test_unknown_patient_returns_to_search() {
        let mut driver = driver_with(Arc::new(CannedTextGenerator));
        let err = driver.search("999").await.expect_err("search should fail");
        assert!(matches!(err, ClaimError::PatientNotFound(_)));
        assert!(matches!(
            driver.session().state(),
            SessionState::Search { error: Some(_) }
        ));
    }

    #[tokio::test]
    async fn test_blank_search_is_invalid_input() {
        let mut driver = driver_with(Arc::new(CannedTextGenerator));
        assert!(matches!(
            driver.search("   ").await,
            Err(ClaimError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_failures_are_scoped_to_their_step() {
        // Summary fails, first justification fails, retry succeeds.
        let mut driver = driver_with(Arc::new(FlakyGenerator {
            failures: 2,
            calls: AtomicUsize::new(0),
        }));
        driver.search("12345").await.expect("search should succeed");
        driver.select_encounter("enc2").expect("select encounter");
        driver.toggle_condition("cond1").expect("toggle condition");
        driver.toggle_procedure("proc2").expect("toggle procedure");

        let summary = driver.review().await.expect("review should succeed");
        assert_eq!(summary.error(), Some(SUMMARY_FAILED_MESSAGE));

        let err = driver.justify().await.expect_err("first justification fails");
        assert!(matches!(err, ClaimError::Justification(_)));
        assert_eq!(
            driver.wizard().expect("wizard").step(),
            WizardStep::ReviewAndJustify
        );

        let claim = driver.justify().await.expect("retry should succeed");
        assert_eq!(claim.clipboard_text(), "Medically necessary.");
    }

    #[tokio::test]
    async fn test_review_requires_selections() {
        let mut driver = driver_with(Arc::new(CannedTextGenerator));
        driver.search("12345").await.expect("search should succeed");
        driver.select_encounter("enc1").expect("select encounter");
        driver.toggle_condition("cond1").expect("toggle condition");

        assert!(matches!(
            driver.review().await,
            Err(ClaimError::InvalidInput(_))
        ));
    }
}
