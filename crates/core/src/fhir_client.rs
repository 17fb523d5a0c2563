//! FHIR server collaborator.
//!
//! The claim workflow needs exactly three capabilities from an EHR:
//! - resolve the patient in the current launch context,
//! - read everything related to a patient (`Patient/{id}/$everything`),
//! - read a single Patient resource directly.
//!
//! [`FhirClient`] captures those capabilities so the lookup and session logic can run against a
//! real server ([`HttpFhirClient`]) or an in-memory fixture ([`StaticFhirClient`]).

use crate::constants::{FHIR_JSON, HTTP_TIMEOUT_SECS, MAX_EVERYTHING_PAGES};
use async_trait::async_trait;
use fhir::PatientId;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FhirClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("FHIR server returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("no patient in the launch context")]
    NoPatientContext,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Authorised access to a FHIR server.
#[async_trait]
pub trait FhirClient: Send + Sync {
    /// The patient selected by the launch context.
    async fn current_patient_id(&self) -> Result<PatientId, FhirClientError>;

    /// `Patient/{id}/$everything` as a single Bundle (all pages merged).
    async fn patient_everything(&self, id: &PatientId) -> Result<Value, FhirClientError>;

    /// `Patient/{id}` as a raw resource.
    async fn read_patient(&self, id: &PatientId) -> Result<Value, FhirClientError>;
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

/// [`FhirClient`] backed by a FHIR REST server.
#[derive(Clone, Debug)]
pub struct HttpFhirClient {
    base_url: Url,
    http: reqwest::Client,
    access_token: Option<String>,
    patient_context: Option<PatientId>,
}

impl HttpFhirClient {
    /// Creates an unauthenticated client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirClientError::InvalidUrl`] if `base_url` cannot carry path segments, or
    /// [`FhirClientError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: Url) -> Result<Self, FhirClientError> {
        if base_url.cannot_be_a_base() {
            return Err(FhirClientError::InvalidUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base_url,
            http,
            access_token: None,
            patient_context: None,
        })
    }

    /// Send `Authorization: Bearer <token>` on every request.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the patient returned by [`FhirClient::current_patient_id`].
    pub fn with_patient_context(mut self, id: PatientId) -> Self {
        self.patient_context = Some(id);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resource_url(&self, segments: &[&str]) -> Result<Url, FhirClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FhirClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn same_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }

    async fn get_json(&self, url: Url) -> Result<Value, FhirClientError> {
        tracing::debug!("GET {}", url);

        let mut request = self.http.get(url.clone()).header(ACCEPT, FHIR_JSON);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FhirClientError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FhirClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl FhirClient for HttpFhirClient {
    async fn current_patient_id(&self) -> Result<PatientId, FhirClientError> {
        self.patient_context
            .clone()
            .ok_or(FhirClientError::NoPatientContext)
    }

    async fn patient_everything(&self, id: &PatientId) -> Result<Value, FhirClientError> {
        let url = self.resource_url(&["Patient", id.as_str(), "$everything"])?;
        let mut bundle = self.get_json(url).await?;

        let mut next = fhir::next_page_link(&bundle).map(str::to_owned);
        let mut pages = 1;
        while let Some(link) = next.take() {
            if pages >= MAX_EVERYTHING_PAGES {
                tracing::warn!(
                    "stopping $everything for Patient/{} after {} pages",
                    id,
                    pages
                );
                break;
            }

            let url = Url::parse(&link).map_err(|_| FhirClientError::InvalidUrl(link.clone()))?;
            if !self.same_origin(&url) {
                tracing::warn!("not following cross-origin page link {}", url);
                break;
            }

            let page = self.get_json(url).await?;
            next = fhir::next_page_link(&page).map(str::to_owned);
            fhir::append_entries(&mut bundle, page);
            pages += 1;
        }

        Ok(bundle)
    }

    async fn read_patient(&self, id: &PatientId) -> Result<Value, FhirClientError> {
        let url = self.resource_url(&["Patient", id.as_str()])?;
        self.get_json(url).await
    }
}

// ============================================================================
// IN-MEMORY CLIENT
// ============================================================================

/// [`FhirClient`] over fixed resources, for offline use and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticFhirClient {
    bundles: HashMap<String, Value>,
    patients: HashMap<String, Value>,
    patient_context: Option<PatientId>,
}

impl StaticFhirClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bundle` as the `$everything` result for `id`.
    pub fn with_bundle(mut self, id: &PatientId, bundle: Value) -> Self {
        self.bundles.insert(id.as_str().to_string(), bundle);
        self
    }

    /// Serve `resource` for direct Patient reads, keyed by its `id`.
    pub fn with_patient(mut self, resource: Value) -> Self {
        if let Some(id) = resource.get("id").and_then(Value::as_str) {
            self.patients.insert(id.to_string(), resource);
        }
        self
    }

    pub fn with_patient_context(mut self, id: PatientId) -> Self {
        self.patient_context = Some(id);
        self
    }
}

#[async_trait]
impl FhirClient for StaticFhirClient {
    async fn current_patient_id(&self) -> Result<PatientId, FhirClientError> {
        self.patient_context
            .clone()
            .ok_or(FhirClientError::NoPatientContext)
    }

    async fn patient_everything(&self, id: &PatientId) -> Result<Value, FhirClientError> {
        self.bundles
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| FhirClientError::NotFound(format!("Patient/{id}/$everything")))
    }

    async fn read_patient(&self, id: &PatientId) -> Result<Value, FhirClientError> {
        self.patients
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| FhirClientError::NotFound(format!("Patient/{id}")))
    }
}
