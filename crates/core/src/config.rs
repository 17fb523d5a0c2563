//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses. Binaries read the environment and hand the raw values to the
//! `*_from_env_value(s)` helpers below.

use crate::constants::{
    DEFAULT_AI_BASE_URL, DEFAULT_AI_MODEL, DEFAULT_FHIR_BASE_URL, DEFAULT_SMART_REDIRECT_URI,
    DEFAULT_SMART_SCOPE,
};
use crate::{ClaimError, ClaimResult};
use reqwest::Url;

/// SMART App Launch registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmartConfig {
    pub client_id: String,
    pub redirect_uri: Url,
    pub scope: String,
}

/// Generative text service settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AiConfig {
    /// `None` is allowed at startup; generation then fails with a typed error at call time.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Url,
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    fhir_base_url: Url,
    smart: Option<SmartConfig>,
    ai: AiConfig,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::InvalidConfig`] if the FHIR base URL is not an http(s) URL.
    pub fn new(fhir_base_url: Url, smart: Option<SmartConfig>, ai: AiConfig) -> ClaimResult<Self> {
        if !matches!(fhir_base_url.scheme(), "http" | "https") {
            return Err(ClaimError::InvalidConfig(format!(
                "FHIR base URL must be http or https, got {}",
                fhir_base_url
            )));
        }

        Ok(Self {
            fhir_base_url,
            smart,
            ai,
        })
    }

    pub fn fhir_base_url(&self) -> &Url {
        &self.fhir_base_url
    }

    /// `None` when no SMART client is registered; patient search still works.
    pub fn smart(&self) -> Option<&SmartConfig> {
        self.smart.as_ref()
    }

    pub fn ai(&self) -> &AiConfig {
        &self.ai
    }
}

/// Parse the FHIR base URL from an optional raw value, falling back to the public sandbox.
pub fn fhir_base_url_from_env_value(value: Option<String>) -> ClaimResult<Url> {
    parse_url(
        "FHIR_BASE_URL",
        non_empty(value).as_deref().unwrap_or(DEFAULT_FHIR_BASE_URL),
    )
}

/// Build the SMART registration from optional raw values.
///
/// Returns `Ok(None)` when no client id is configured.
pub fn smart_config_from_env_values(
    client_id: Option<String>,
    redirect_uri: Option<String>,
    scope: Option<String>,
) -> ClaimResult<Option<SmartConfig>> {
    let Some(client_id) = non_empty(client_id) else {
        return Ok(None);
    };

    let redirect_uri = parse_url(
        "SMART_REDIRECT_URI",
        non_empty(redirect_uri)
            .as_deref()
            .unwrap_or(DEFAULT_SMART_REDIRECT_URI),
    )?;
    let scope = non_empty(scope).unwrap_or_else(|| DEFAULT_SMART_SCOPE.to_string());

    Ok(Some(SmartConfig {
        client_id,
        redirect_uri,
        scope,
    }))
}

/// Build the generative text settings from optional raw values.
pub fn ai_config_from_env_values(
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
) -> ClaimResult<AiConfig> {
    let base_url = parse_url(
        "GEMINI_BASE_URL",
        non_empty(base_url).as_deref().unwrap_or(DEFAULT_AI_BASE_URL),
    )?;

    Ok(AiConfig {
        api_key: non_empty(api_key),
        model: non_empty(model).unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
        base_url,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_url(name: &str, value: &str) -> ClaimResult<Url> {
    Url::parse(value).map_err(|e| ClaimError::InvalidConfig(format!("{name}: {e}")))
}
