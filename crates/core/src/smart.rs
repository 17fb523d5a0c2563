//! SMART App Launch (OAuth2 authorisation code flow with PKCE).
//!
//! The claim workflow treats authorisation as an opaque, two-phase operation:
//! 1. [`SmartLauncher::begin`] discovers the server's endpoints and produces the URL the user is
//!    redirected to.
//! 2. [`SmartLauncher::complete`] validates the redirect back and exchanges the code for a token,
//!    yielding an authorised [`HttpFhirClient`].
//!
//! Failures are classified by phase so the user can be told whether the redirect never started
//! or the post-redirect exchange failed.

use crate::config::SmartConfig;
use crate::constants::HTTP_TIMEOUT_SECS;
use crate::fhir_client::HttpFhirClient;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use fhir::PatientId;
use rand::RngCore;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Failed before the user was sent to the authorisation server.
    #[error("could not start authorization: {0}")]
    Redirect(String),
    /// Failed after the authorisation server redirected back.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
}

impl AuthError {
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Redirect(msg) => format!("Could not start EHR authorization: {msg}"),
            AuthError::TokenExchange(msg) => {
                format!("EHR authorization failed after redirect: {msg}")
            }
        }
    }
}

/// Endpoints advertised in `.well-known/smart-configuration`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmartEndpoints {
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
}

/// The members of a smart-configuration document the launch needs. Other members are ignored.
#[derive(Debug, Deserialize)]
struct SmartConfigurationWire {
    authorization_endpoint: String,
    token_endpoint: String,
}

impl TryFrom<SmartConfigurationWire> for SmartEndpoints {
    type Error = AuthError;

    fn try_from(wire: SmartConfigurationWire) -> Result<Self, Self::Error> {
        let parse = |name: &str, value: &str| {
            Url::parse(value)
                .map_err(|e| AuthError::Redirect(format!("invalid {name} {value:?}: {e}")))
        };
        Ok(Self {
            authorization_endpoint: parse("authorization_endpoint", &wire.authorization_endpoint)?,
            token_endpoint: parse("token_endpoint", &wire.token_endpoint)?,
        })
    }
}

/// State carried between [`SmartLauncher::begin`] and [`SmartLauncher::complete`].
#[derive(Clone, Debug)]
pub struct PendingAuthorization {
    authorize_url: Url,
    state: String,
    code_verifier: String,
    token_endpoint: Url,
}

impl PendingAuthorization {
    /// Where to send the user.
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn for_tests(state: &str) -> Self {
        let url = Url::parse("http://127.0.0.1:9/auth/authorize").expect("valid url");
        Self {
            authorize_url: url.clone(),
            state: state.into(),
            code_verifier: code_verifier(),
            token_endpoint: url,
        }
    }
}

/// Query parameters of the redirect back from the authorisation server.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    patient: Option<String>,
}

/// Runs SMART App Launch against one FHIR server.
#[derive(Clone, Debug)]
pub struct SmartLauncher {
    config: SmartConfig,
    fhir_base_url: Url,
    http: reqwest::Client,
}

impl SmartLauncher {
    /// # Errors
    ///
    /// Returns [`AuthError::Redirect`] if the HTTP client cannot be built.
    pub fn new(config: SmartConfig, fhir_base_url: Url) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::Redirect(e.to_string()))?;

        Ok(Self {
            config,
            fhir_base_url,
            http,
        })
    }

    /// Fetch the server's SMART configuration.
    pub async fn discover(&self) -> Result<SmartEndpoints, AuthError> {
        let mut url = self.fhir_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AuthError::Redirect(format!("invalid FHIR base URL {}", self.fhir_base_url)))?
            .pop_if_empty()
            .extend([".well-known", "smart-configuration"]);

        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthError::Redirect(format!("discovery request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Redirect(format!(
                "discovery at {url} returned {}",
                response.status()
            )));
        }

        response
            .json::<SmartConfigurationWire>()
            .await
            .map_err(|e| AuthError::Redirect(format!("invalid SMART configuration: {e}")))?
            .try_into()
    }

    /// Start an authorisation. `launch` is the EHR launch token, absent for standalone launch.
    pub async fn begin(&self, launch: Option<String>) -> Result<PendingAuthorization, AuthError> {
        let endpoints = self.discover().await?;

        let state = uuid::Uuid::new_v4().simple().to_string();
        let code_verifier = code_verifier();
        let code_challenge = code_challenge(&code_verifier);

        let mut authorize_url = endpoints.authorization_endpoint.clone();
        {
            let mut query = authorize_url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", self.config.redirect_uri.as_str())
                .append_pair("scope", &self.config.scope)
                .append_pair("state", &state)
                .append_pair("aud", self.fhir_base_url.as_str())
                .append_pair("code_challenge", &code_challenge)
                .append_pair("code_challenge_method", "S256");
            if let Some(launch) = launch.as_deref().filter(|l| !l.trim().is_empty()) {
                query.append_pair("launch", launch);
            }
        }

        tracing::info!("starting SMART authorization at {}", endpoints.authorization_endpoint);

        Ok(PendingAuthorization {
            authorize_url,
            state,
            code_verifier,
            token_endpoint: endpoints.token_endpoint,
        })
    }

    /// Finish an authorisation from the redirect parameters.
    pub async fn complete(
        &self,
        pending: &PendingAuthorization,
        callback: CallbackParams,
    ) -> Result<HttpFhirClient, AuthError> {
        if let Some(error) = callback.error {
            let detail = callback
                .error_description
                .map(|d| format!("{error}: {d}"))
                .unwrap_or(error);
            return Err(AuthError::TokenExchange(detail));
        }

        if callback.state.as_deref() != Some(pending.state.as_str()) {
            return Err(AuthError::TokenExchange("state mismatch".into()));
        }

        let code = callback
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::TokenExchange("missing authorization code".into()))?;

        let response = self
            .http
            .post(pending.token_endpoint.clone())
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("code_verifier", pending.code_verifier.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("invalid token response: {e}")))?;

        let mut client = HttpFhirClient::new(self.fhir_base_url.clone())
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?
            .with_access_token(token.access_token);

        match token.patient.as_deref().map(PatientId::new) {
            Some(Ok(patient)) => client = client.with_patient_context(patient),
            Some(Err(_)) | None => {
                tracing::warn!("token response carried no patient launch context");
            }
        }

        Ok(client)
    }
}

fn code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
