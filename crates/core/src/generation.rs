//! Generative text collaborator.
//!
//! Two short narratives are produced during a claim: a plain-language summary shown on the review
//! step and the clinical justification that is submitted. Both are a single templated prompt sent
//! to a [`TextGenerator`]; the core never retries.

use crate::config::AiConfig;
use crate::constants::HTTP_TIMEOUT_SECS;
use async_trait::async_trait;
use fhir::{Condition, Procedure};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("no API key is configured for text generation")]
    MissingApiKey,
    #[error("text generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("text generation service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("text generation service returned no text")]
    EmptyResponse,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// A single prompt-in, text-out call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

// ============================================================================
// GEMINI
// ============================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    error: ServiceErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorDetail {
    #[serde(default)]
    message: String,
}

/// [`TextGenerator`] backed by the Gemini `generateContent` API.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    base_url: Url,
    http: reqwest::Client,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the HTTP client cannot be built. A missing API key is not an
    /// error here; it is reported by [`TextGenerator::generate`].
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            http,
        })
    }

    fn endpoint(&self) -> Result<Url, AiError> {
        let call = format!("{}:generateContent", self.model);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AiError::InvalidInput(format!("invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(["models", call.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        let url = self.endpoint()?;

        tracing::debug!("requesting text generation from model {}", self.model);

        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ServiceErrorBody>(&raw)
                .map(|b| b.error.message)
                .unwrap_or(raw);
            return Err(AiError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = response.json::<GenerateResponse>().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

// ============================================================================
// OFFLINE
// ============================================================================

pub const CANNED_JUSTIFICATION: &str = "This is a mock clinical justification. The services \
provided were deemed medically necessary for the patient's diagnosed conditions, ensuring proper \
evaluation and management.";

pub const CANNED_SUMMARY: &str = "This is a mock patient summary. The patient presented with \
several conditions and received corresponding procedures for evaluation and management.";

/// Offline [`TextGenerator`] returning fixed text.
///
/// The prompt decides which text is returned: summary prompts get [`CANNED_SUMMARY`], everything
/// else gets [`CANNED_JUSTIFICATION`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CannedTextGenerator;

#[async_trait]
impl TextGenerator for CannedTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        if prompt.starts_with(SUMMARY_PREAMBLE) {
            Ok(CANNED_SUMMARY.to_string())
        } else {
            Ok(CANNED_JUSTIFICATION.to_string())
        }
    }
}

// ============================================================================
// CLAIM WRITER
// ============================================================================

const JUSTIFICATION_PREAMBLE: &str = "You are a medical billing assistant. Write a concise \
clinical justification of 2-3 sentences establishing the medical necessity of the procedures \
below for the diagnoses below. Reply with the justification text only.";

const SUMMARY_PREAMBLE: &str = "Summarise the following visit for the patient in 1-2 sentences \
of plain, non-technical language. Reply with the summary text only.";

/// Writes the claim narratives through a [`TextGenerator`].
#[derive(Clone)]
pub struct ClaimWriter {
    generator: Arc<dyn TextGenerator>,
}

impl ClaimWriter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Produce a 2-3 sentence medical-necessity narrative.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::InvalidInput`] if either list is empty, otherwise whatever the generator
    /// reports.
    pub async fn clinical_justification(
        &self,
        diagnoses: &[Condition],
        procedures: &[Procedure],
    ) -> Result<String, AiError> {
        let prompt = build_prompt(JUSTIFICATION_PREAMBLE, diagnoses, procedures)?;
        self.generator.generate(&prompt).await
    }

    /// Produce a 1-2 sentence plain-language summary.
    ///
    /// # Errors
    ///
    /// As for [`ClaimWriter::clinical_justification`].
    pub async fn patient_summary(
        &self,
        diagnoses: &[Condition],
        procedures: &[Procedure],
    ) -> Result<String, AiError> {
        let prompt = build_prompt(SUMMARY_PREAMBLE, diagnoses, procedures)?;
        self.generator.generate(&prompt).await
    }
}

impl std::fmt::Debug for ClaimWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimWriter").finish_non_exhaustive()
    }
}

fn build_prompt(
    preamble: &str,
    diagnoses: &[Condition],
    procedures: &[Procedure],
) -> Result<String, AiError> {
    if diagnoses.is_empty() {
        return Err(AiError::InvalidInput("at least one diagnosis is required".into()));
    }
    if procedures.is_empty() {
        return Err(AiError::InvalidInput("at least one procedure is required".into()));
    }

    let mut prompt = String::from(preamble);
    prompt.push_str("\n\nDiagnoses:\n");
    for d in diagnoses {
        let _ = writeln!(prompt, "- {}: {}", d.code, d.description);
    }
    prompt.push_str("\nProcedures:\n");
    for p in procedures {
        let _ = writeln!(prompt, "- {}: {}", p.code, p.description);
    }
    Ok(prompt)
}
