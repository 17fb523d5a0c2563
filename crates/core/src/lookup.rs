//! Patient lookup.
//!
//! A lookup reads `$everything` for the patient and parses it. Some servers leave the subject
//! Patient out of its own `$everything` Bundle, so when the parse yields no patient the Patient
//! resource is read directly and mapped with the same rules. The clinical lists always come from
//! the Bundle.

use crate::fhir_client::{FhirClient, FhirClientError};
use crate::{ClaimError, ClaimResult};
use fhir::{parse_bundle, Patient, PatientData, PatientId};
use serde::Serialize;

/// A patient together with their clinical lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PatientRecord {
    pub patient: Patient,
    pub data: PatientData,
}

/// Load the patient identified by `id`.
///
/// # Errors
///
/// - [`ClaimError::PatientNotFound`] if the server reports the patient missing at either stage,
///   or the directly read Patient cannot be mapped.
/// - [`ClaimError::Fetch`] for any other client failure.
/// - [`ClaimError::Fhir`] if the `$everything` response is not a Bundle.
pub async fn load_patient(client: &dyn FhirClient, id: &PatientId) -> ClaimResult<PatientRecord> {
    tracing::info!("loading patient {id}");

    let bundle = client
        .patient_everything(id)
        .await
        .map_err(|e| classify(id, e))?;
    let parsed = parse_bundle(&bundle, id)?;

    let patient = match parsed.patient {
        Some(patient) => patient,
        None => {
            tracing::info!("patient {id} not in $everything bundle; reading Patient directly");
            let resource = client
                .read_patient(id)
                .await
                .map_err(|e| classify(id, e))?;
            Patient::from_resource(&resource).map_err(|e| {
                tracing::warn!("failed to map Patient {id}: {e}");
                ClaimError::PatientNotFound(id.to_string())
            })?
        }
    };

    tracing::debug!(
        "patient {id}: {} encounters, {} conditions, {} procedures",
        parsed.data.encounters.len(),
        parsed.data.conditions.len(),
        parsed.data.procedures.len()
    );

    Ok(PatientRecord {
        patient,
        data: parsed.data,
    })
}

/// Load the patient selected by the client's launch context.
pub async fn load_current_patient(client: &dyn FhirClient) -> ClaimResult<PatientRecord> {
    let id = client.current_patient_id().await.map_err(ClaimError::Fetch)?;
    load_patient(client, &id).await
}

fn classify(id: &PatientId, err: FhirClientError) -> ClaimError {
    match err {
        FhirClientError::NotFound(_) => ClaimError::PatientNotFound(id.to_string()),
        other => {
            tracing::error!("fetching patient {id} failed: {other}");
            ClaimError::Fetch(other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir_client::StaticFhirClient;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    fn pid(s: &str) -> PatientId {
        PatientId::new(s).expect("valid patient id")
    }

    fn patient_resource(id: &str) -> Value {
        json!({
            "resourceType": "Patient",
            "id": id,
            "name": [{ "given": ["John"], "family": "Appleseed" }],
            "birthDate": "1985-04-12",
            "gender": "male"
        })
    }

    fn bundle(entries: Vec<Value>) -> Value {
        json!({
            "resourceType": "Bundle",
            "entry": entries.into_iter().map(|r| json!({ "resource": r })).collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn test_patient_from_bundle() {
        let id = pid("12345");
        let client = StaticFhirClient::new().with_bundle(
            &id,
            bundle(vec![
                patient_resource("12345"),
                json!({ "resourceType": "Condition", "id": "c1", "code": { "text": "Cough" } }),
            ]),
        );

        let record = load_patient(&client, &id).await.expect("lookup should succeed");
        assert_eq!(record.patient.name, "John Appleseed");
        assert_eq!(record.data.conditions.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_bundle_falls_back_to_direct_read() {
        let id = pid("12345");
        let client = StaticFhirClient::new()
            .with_bundle(&id, bundle(vec![]))
            .with_patient(patient_resource("12345"));

        let record = load_patient(&client, &id).await.expect("fallback should succeed");
        assert_eq!(record.patient.id, "12345");
        assert!(record.data.encounters.is_empty());
        assert!(record.data.conditions.is_empty());
        assert!(record.data.procedures.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_keeps_bundle_lists() {
        let id = pid("12345");
        let client = StaticFhirClient::new()
            .with_bundle(
                &id,
                bundle(vec![
                    patient_resource("someone-else"),
                    json!({ "resourceType": "Encounter", "id": "e1", "period": { "start": "2023-08-15" } }),
                    json!({ "resourceType": "Encounter", "id": "e2", "period": { "start": "2023-10-26" } }),
                ]),
            )
            .with_patient(patient_resource("12345"));

        let record = load_patient(&client, &id).await.expect("fallback should succeed");
        assert_eq!(record.patient.id, "12345");
        let dates: Vec<_> = record.data.encounters.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, ["2023-10-26", "2023-08-15"]);
    }

    #[tokio::test]
    async fn test_missing_everything_is_patient_not_found() {
        let client = StaticFhirClient::new();
        let err = load_patient(&client, &pid("999"))
            .await
            .expect_err("lookup should fail");
        assert!(matches!(err, ClaimError::PatientNotFound(id) if id == "999"));
    }

    #[tokio::test]
    async fn test_missing_fallback_patient_is_patient_not_found() {
        let id = pid("12345");
        let client = StaticFhirClient::new().with_bundle(&id, bundle(vec![]));
        let err = load_patient(&client, &id).await.expect_err("lookup should fail");
        assert!(matches!(err, ClaimError::PatientNotFound(_)));
    }

    #[tokio::test]
    async fn test_unmappable_fallback_patient_is_patient_not_found() {
        let id = pid("12345");
        let client = StaticFhirClient::new()
            .with_bundle(&id, bundle(vec![]))
            .with_patient(json!({ "resourceType": "Patient", "id": "12345", "name": "oops" }));
        let err = load_patient(&client, &id).await.expect_err("lookup should fail");
        assert!(matches!(err, ClaimError::PatientNotFound(_)));
    }

    struct FailingClient;

    #[async_trait]
    impl FhirClient for FailingClient {
        async fn current_patient_id(&self) -> Result<PatientId, FhirClientError> {
            Ok(PatientId::new("12345").expect("valid patient id"))
        }

        async fn patient_everything(&self, _id: &PatientId) -> Result<Value, FhirClientError> {
            Err(FhirClientError::Status {
                status: 500,
                url: "http://fhir/Patient/12345/$everything".into(),
            })
        }

        async fn read_patient(&self, _id: &PatientId) -> Result<Value, FhirClientError> {
            unreachable!("fallback must not run after a fetch failure")
        }
    }

    #[tokio::test]
    async fn test_server_failure_is_fetch_error() {
        let err = load_current_patient(&FailingClient)
            .await
            .expect_err("lookup should fail");
        assert!(matches!(err, ClaimError::Fetch(FhirClientError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_current_patient_uses_launch_context() {
        let id = pid("12345");
        let client = StaticFhirClient::new()
            .with_bundle(&id, bundle(vec![patient_resource("12345")]))
            .with_patient_context(id.clone());

        let record = load_current_patient(&client).await.expect("lookup should succeed");
        assert_eq!(record.patient.id, "12345");
    }

    #[tokio::test]
    async fn test_current_patient_without_context_fails() {
        let err = load_current_patient(&StaticFhirClient::new())
            .await
            .expect_err("lookup should fail");
        assert!(matches!(err, ClaimError::Fetch(FhirClientError::NoPatientContext)));
    }
}
