use claim_core::{
    ClaimWriter, CoreConfig, GeminiClient, HttpFhirClient, Session, SmartLauncher,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application state for the REST API server
///
/// One session is shared by every request. Handlers hold the lock only while reading or applying
/// session operations; FHIR, authorisation and text-generation calls are awaited without it.
#[derive(Clone)]
pub struct AppState {
    pub(crate) session: Arc<Mutex<Session>>,
    pub(crate) writer: ClaimWriter,
    pub(crate) launcher: Option<Arc<SmartLauncher>>,
}

impl AppState {
    pub fn new(session: Session, writer: ClaimWriter, launcher: Option<SmartLauncher>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            writer,
            launcher: launcher.map(Arc::new),
        }
    }

    /// Build the production collaborators from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any HTTP client cannot be constructed.
    pub fn from_config(cfg: &CoreConfig) -> anyhow::Result<Self> {
        let client = HttpFhirClient::new(cfg.fhir_base_url().clone())?;
        let writer = ClaimWriter::new(Arc::new(GeminiClient::new(cfg.ai())?));
        let launcher = cfg
            .smart()
            .map(|smart| SmartLauncher::new(smart.clone(), cfg.fhir_base_url().clone()))
            .transpose()?;

        if launcher.is_none() {
            tracing::info!("SMART_CLIENT_ID not set; EHR launch is disabled");
        }

        Ok(Self::new(Session::new(Arc::new(client)), writer, launcher))
    }

    pub fn smart_enabled(&self) -> bool {
        self.launcher.is_some()
    }
}
