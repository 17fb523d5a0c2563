use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api_rest::{AppState, router};
use claim_core::CoreConfig;
use claim_core::config::{
    ai_config_from_env_values, fhir_base_url_from_env_value, smart_config_from_env_values,
};

/// Main entry point for the claim wizard server
///
/// Serves the REST API a browser front-end uses to run claims.
///
/// # Environment Variables
/// - `CLAIM_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `FHIR_BASE_URL`: FHIR server base URL (default: "https://r4.smarthealthit.org")
/// - `SMART_CLIENT_ID`: SMART client id; EHR launch is disabled when unset
/// - `SMART_REDIRECT_URI`: SMART redirect URI (default: "http://localhost:3000/callback")
/// - `SMART_SCOPE`: SMART scopes
/// - `GEMINI_API_KEY`: text generation API key
/// - `GEMINI_MODEL`: text generation model (default: "gemini-2.5-flash")
/// - `GEMINI_BASE_URL`: text generation API base URL
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - any configuration value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(log_filter()?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = core_config_from_env()?;
    let rest_addr = std::env::var("CLAIM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("++ Starting claim REST on {}", rest_addr);
    tracing::info!("++ Using FHIR server {}", cfg.fhir_base_url());

    let app = router(AppState::from_config(&cfg)?);

    let listener = tokio::net::TcpListener::bind(&rest_addr)
        .await
        .with_context(|| format!("failed to bind {rest_addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `RUST_LOG` plus info-level logging for every workspace crate.
fn log_filter() -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("claim=info".parse()?)
        .add_directive("api_rest=info".parse()?)
        .add_directive("fhir=info".parse()?))
}

/// Resolve configuration from the process environment.
fn core_config_from_env() -> anyhow::Result<CoreConfig> {
    let fhir_base_url = fhir_base_url_from_env_value(std::env::var("FHIR_BASE_URL").ok())?;
    let smart = smart_config_from_env_values(
        std::env::var("SMART_CLIENT_ID").ok(),
        std::env::var("SMART_REDIRECT_URI").ok(),
        std::env::var("SMART_SCOPE").ok(),
    )?;
    let ai = ai_config_from_env_values(
        std::env::var("GEMINI_API_KEY").ok(),
        std::env::var("GEMINI_MODEL").ok(),
        std::env::var("GEMINI_BASE_URL").ok(),
    )?;

    if ai.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; summaries and justifications will fail");
    }

    Ok(CoreConfig::new(fhir_base_url, smart, ai)?)
}
