//! Application session.
//!
//! The session is the single owner of everything a user builds up: whether they are searching,
//! waiting for a lookup, or working through a claim; which FHIR client is in use; and any SMART
//! authorisation awaiting its redirect. [`Session::reset`] returns all of it to the initial
//! search state in one step.
//!
//! Lookups follow the same ticket discipline as the wizard's generation calls: the fetch runs
//! outside the session and its result is only applied if no reset or newer lookup happened in
//! between.

use crate::fhir_client::FhirClient;
use crate::lookup::PatientRecord;
use crate::smart::{AuthError, PendingAuthorization};
use crate::wizard::ClaimWizard;
use crate::{ClaimError, ClaimResult};
use std::sync::Arc;

/// Where the user is.
#[derive(Clone, Debug)]
pub enum SessionState {
    /// Patient search / login. `error` is the message from the last failed attempt.
    Search { error: Option<String> },
    /// A patient lookup is in flight.
    Loading,
    /// Working on a claim.
    Active(Box<ClaimWizard>),
}

/// Authorises applying one lookup result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupTicket(u64);

pub struct Session {
    state: SessionState,
    default_client: Arc<dyn FhirClient>,
    client: Arc<dyn FhirClient>,
    pending_login: Option<PendingAuthorization>,
    lookup: Option<LookupTicket>,
    last_token: u64,
}

impl Session {
    /// Create a session in the search state using `default_client` for lookups.
    pub fn new(default_client: Arc<dyn FhirClient>) -> Self {
        Self {
            state: SessionState::Search { error: None },
            client: default_client.clone(),
            default_client,
            pending_login: None,
            lookup: None,
            last_token: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The client lookups should use: the authorised client after a SMART login, otherwise the
    /// default one.
    pub fn client(&self) -> Arc<dyn FhirClient> {
        self.client.clone()
    }

    pub fn is_login_pending(&self) -> bool {
        self.pending_login.is_some()
    }

    pub fn wizard(&self) -> ClaimResult<&ClaimWizard> {
        match &self.state {
            SessionState::Active(wizard) => Ok(&**wizard),
            _ => Err(ClaimError::NoActiveSession),
        }
    }

    pub fn wizard_mut(&mut self) -> ClaimResult<&mut ClaimWizard> {
        match &mut self.state {
            SessionState::Active(wizard) => Ok(&mut **wizard),
            _ => Err(ClaimError::NoActiveSession),
        }
    }

    /// Start a patient lookup.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::Busy`] while another lookup is in flight.
    /// - [`ClaimError::SessionActive`] while a claim is open.
    pub fn begin_lookup(&mut self) -> ClaimResult<LookupTicket> {
        match self.state {
            SessionState::Search { .. } => {}
            SessionState::Loading => return Err(ClaimError::Busy("lookup")),
            SessionState::Active(_) => return Err(ClaimError::SessionActive),
        }

        if self.pending_login.take().is_some() {
            tracing::debug!("lookup supersedes the pending SMART authorization");
        }

        self.last_token += 1;
        let ticket = LookupTicket(self.last_token);
        self.lookup = Some(ticket);
        self.state = SessionState::Loading;
        Ok(ticket)
    }

    /// Open the wizard for a loaded patient. Returns `false` if the ticket is stale.
    pub fn finish_lookup(&mut self, ticket: LookupTicket, record: PatientRecord) -> bool {
        if !self.redeem(ticket) {
            return false;
        }
        tracing::info!("session opened for patient {}", record.patient.id);
        self.state = SessionState::Active(Box::new(ClaimWizard::new(record)));
        true
    }

    /// Return to search showing the failure. Returns `false` if the ticket is stale.
    pub fn fail_lookup(&mut self, ticket: LookupTicket, err: &ClaimError) -> bool {
        if !self.redeem(ticket) {
            return false;
        }
        tracing::warn!("patient lookup failed: {err}");
        self.state = SessionState::Search {
            error: Some(err.user_message()),
        };
        true
    }

    /// Remember a SMART authorisation while the user is away at the authorisation server.
    ///
    /// # Errors
    ///
    /// [`ClaimError::SessionActive`] unless the session is in the search state.
    pub fn begin_login(&mut self, pending: PendingAuthorization) -> ClaimResult<()> {
        if !matches!(self.state, SessionState::Search { .. }) {
            return Err(ClaimError::SessionActive);
        }
        self.pending_login = Some(pending);
        Ok(())
    }

    /// Take the authorisation started by [`Session::begin_login`] if `state` is the one it was
    /// issued with. A mismatched callback leaves the pending authorisation in place.
    ///
    /// # Errors
    ///
    /// [`ClaimError::Authorization`] if no login is in progress or `state` does not match.
    pub fn take_pending_login(&mut self, state: Option<&str>) -> ClaimResult<PendingAuthorization> {
        match self.pending_login.take() {
            None => Err(ClaimError::Authorization(AuthError::TokenExchange(
                "no authorization is in progress".into(),
            ))),
            Some(pending) if state != Some(pending.state()) => {
                tracing::warn!("ignoring SMART callback with mismatched state");
                self.pending_login = Some(pending);
                Err(ClaimError::Authorization(AuthError::TokenExchange(
                    "state mismatch".into(),
                )))
            }
            Some(pending) => Ok(pending),
        }
    }

    /// Apply the outcome of a SMART login.
    ///
    /// On success the authorised client replaces the default one and a lookup of the launch
    /// patient begins. On failure the session returns to search showing the failure, which is
    /// also returned. Outcomes arriving after the user left the search state are ignored.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::Authorization`] if the login failed.
    /// - [`ClaimError::Busy`] or [`ClaimError::SessionActive`] if a lookup or claim has started
    ///   since; the session is left untouched.
    pub fn finish_login(
        &mut self,
        outcome: Result<Arc<dyn FhirClient>, AuthError>,
    ) -> ClaimResult<LookupTicket> {
        match self.state {
            SessionState::Search { .. } => {}
            SessionState::Loading => {
                tracing::debug!("ignoring SMART login result during a lookup");
                return Err(ClaimError::Busy("lookup"));
            }
            SessionState::Active(_) => {
                tracing::debug!("ignoring SMART login result for an open claim");
                return Err(ClaimError::SessionActive);
            }
        }

        match outcome {
            Ok(client) => {
                tracing::info!("SMART authorization complete");
                self.client = client;
                self.begin_lookup()
            }
            Err(err) => {
                let err = ClaimError::Authorization(err);
                tracing::warn!("{err}");
                self.report_error(&err);
                Err(err)
            }
        }
    }

    /// Record a failure that happened before a login could start, such as discovery.
    pub fn fail_login(&mut self, err: &ClaimError) {
        self.pending_login = None;
        self.report_error(err);
    }

    /// Show `err` on the search screen. Does nothing outside the search state.
    pub fn report_error(&mut self, err: &ClaimError) {
        if matches!(self.state, SessionState::Search { .. }) {
            self.state = SessionState::Search {
                error: Some(err.user_message()),
            };
        }
    }

    /// Discard everything and return to an empty search.
    pub fn reset(&mut self) {
        tracing::info!("session reset");
        self.state = SessionState::Search { error: None };
        self.client = self.default_client.clone();
        self.pending_login = None;
        self.lookup = None;
    }

    fn redeem(&mut self, ticket: LookupTicket) -> bool {
        if self.lookup != Some(ticket) || !matches!(self.state, SessionState::Loading) {
            tracing::debug!("ignoring stale lookup result");
            return false;
        }
        self.lookup = None;
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("pending_login", &self.pending_login.is_some())
            .finish_non_exhaustive()
    }
}
