use crate::constants::{FETCH_FAILED_MESSAGE, JUSTIFICATION_FAILED_MESSAGE, SUMMARY_FAILED_MESSAGE};
use crate::fhir_client::FhirClientError;
use crate::generation::AiError;
use crate::smart::AuthError;
use crate::wizard::WizardStep;

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("patient {0} not found")]
    PatientNotFound(String),
    #[error("failed to fetch patient data: {0}")]
    Fetch(#[source] FhirClientError),
    #[error("authorization failed: {0}")]
    Authorization(#[from] AuthError),
    #[error("summary generation failed: {0}")]
    Summary(#[source] AiError),
    #[error("justification generation failed: {0}")]
    Justification(#[source] AiError),

    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),

    #[error("cannot {action} while in step {step}")]
    InvalidTransition { step: WizardStep, action: &'static str },
    #[error("unknown {kind} {id}")]
    UnknownItem { kind: &'static str, id: String },
    #[error("a {0} request is already in progress")]
    Busy(&'static str),
    #[error("no patient session is active")]
    NoActiveSession,
    #[error("a patient session is already active; reset it first")]
    SessionActive,
}

impl ClaimError {
    /// The message shown to the user for this failure.
    ///
    /// Failures from collaborators are deliberately coarse: the user sees one stable sentence per
    /// failure class and the detail goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            ClaimError::PatientNotFound(id) => format!("Patient with ID \"{id}\" not found."),
            ClaimError::Fetch(_) => FETCH_FAILED_MESSAGE.to_string(),
            ClaimError::Authorization(err) => err.user_message(),
            ClaimError::Summary(_) => SUMMARY_FAILED_MESSAGE.to_string(),
            ClaimError::Justification(_) => JUSTIFICATION_FAILED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

pub type ClaimResult<T> = std::result::Result<T, ClaimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_failure_names_the_patient() {
        let err = ClaimError::PatientNotFound("42".into());
        assert_eq!(err.user_message(), "Patient with ID \"42\" not found.");
    }

    #[test]
    fn test_fetch_failure_is_distinct_from_lookup_failure() {
        let err = ClaimError::Fetch(FhirClientError::Status {
            status: 500,
            url: "http://fhir/Patient/1/$everything".into(),
        });
        assert_eq!(err.user_message(), FETCH_FAILED_MESSAGE);
    }

    #[test]
    fn test_generation_failures_have_step_specific_messages() {
        assert_eq!(
            ClaimError::Summary(AiError::MissingApiKey).user_message(),
            SUMMARY_FAILED_MESSAGE
        );
        assert_eq!(
            ClaimError::Justification(AiError::MissingApiKey).user_message(),
            JUSTIFICATION_FAILED_MESSAGE
        );
    }

    #[test]
    fn test_authorization_messages_differ_by_phase() {
        let redirect = ClaimError::from(AuthError::Redirect("discovery failed".into()));
        let exchange = ClaimError::from(AuthError::TokenExchange("invalid_grant".into()));
        assert_ne!(redirect.user_message(), exchange.user_message());
        assert!(redirect.user_message().contains("discovery failed"));
        assert!(exchange.user_message().contains("invalid_grant"));
    }
}
