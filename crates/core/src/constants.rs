//! Constants used throughout the claim core crate.
//!
//! Defaults for configuration values, HTTP behaviour and user-facing messages live here so that
//! binaries and tests agree on them.

/// Default FHIR server base URL (the public SMART sandbox).
pub const DEFAULT_FHIR_BASE_URL: &str = "https://r4.smarthealthit.org";

/// Default redirect URI registered for the SMART launch.
pub const DEFAULT_SMART_REDIRECT_URI: &str = "http://localhost:3000/callback";

/// Default scopes requested during the SMART launch.
pub const DEFAULT_SMART_SCOPE: &str = "launch launch/patient patient/*.read openid fhirUser";

/// Default generative text model.
pub const DEFAULT_AI_MODEL: &str = "gemini-2.5-flash";

/// Default generative text API base URL.
pub const DEFAULT_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Media type for FHIR JSON requests and responses.
pub const FHIR_JSON: &str = "application/fhir+json";

/// Upper bound on `$everything` pages followed for one patient.
pub const MAX_EVERYTHING_PAGES: usize = 20;

/// Timeout applied to every outbound HTTP request, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Shown when the patient detail fetch fails for any reason other than "not found".
pub const FETCH_FAILED_MESSAGE: &str =
    "An unexpected error occurred while fetching patient data.";

/// Shown when the plain-language summary could not be generated.
pub const SUMMARY_FAILED_MESSAGE: &str =
    "Failed to generate AI summary. You can still review the details below.";

/// Shown when the clinical justification could not be generated.
pub const JUSTIFICATION_FAILED_MESSAGE: &str =
    "Failed to generate AI justification. Please try again.";
