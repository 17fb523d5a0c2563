//! HTTP handlers.
//!
//! Every handler that changes the session responds with the resulting [`SessionView`]. Lookup,
//! authorisation and text-generation failures are part of that view rather than HTTP errors;
//! only requests the session refuses outright become [`ApiError`]s.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::views::{ErrorRes, HealthRes, SearchReq, SelectEncounterReq, SessionView};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use claim_core::{
    load_current_patient, load_patient, CallbackParams, ClaimError, ClaimResult, FhirClient,
    LookupTicket, PatientRecord, Session, SessionState, SmartLauncher,
};
use fhir::PatientId;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LaunchParams {
    /// Launch token supplied by the EHR; absent for a standalone launch.
    pub launch: Option<String>,
}

fn view(session: &Session, state: &AppState) -> Json<SessionView> {
    Json(SessionView::build(
        session,
        state.smart_enabled(),
        chrono::Local::now().date_naive(),
    ))
}

fn launcher(state: &AppState) -> ApiResult<Arc<SmartLauncher>> {
    state.launcher.clone().ok_or_else(|| {
        ApiError(ClaimError::InvalidConfig(
            "SMART launch is not configured".into(),
        ))
    })
}

fn apply_lookup(session: &mut Session, ticket: LookupTicket, outcome: ClaimResult<PatientRecord>) {
    match outcome {
        Ok(record) => {
            session.finish_lookup(ticket, record);
        }
        Err(err) => {
            session.fail_lookup(ticket, &err);
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Claim REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Current session", body = SessionView)
    )
)]
#[axum::debug_handler]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    let session = state.session.lock().await;
    view(&session, &state)
}

#[utoipa::path(
    post,
    path = "/patients/search",
    request_body = SearchReq,
    responses(
        (status = 200, description = "Lookup finished; on failure `error` is set", body = SessionView),
        (status = 400, description = "Blank patient id", body = ErrorRes),
        (status = 409, description = "A lookup is running or a claim is open", body = ErrorRes)
    )
)]
/// Look up a patient by id and open a claim for them
///
/// # Errors
/// Returns `400 Bad Request` for a blank id and `409 Conflict` unless the session is in search.
#[axum::debug_handler]
pub async fn search_patient(
    State(state): State<AppState>,
    Json(req): Json<SearchReq>,
) -> ApiResult<Json<SessionView>> {
    let id =
        PatientId::new(&req.patient_id).map_err(|e| ClaimError::InvalidInput(e.to_string()))?;

    let (ticket, client) = {
        let mut session = state.session.lock().await;
        let ticket = session.begin_lookup()?;
        (ticket, session.client())
    };

    let outcome = load_patient(client.as_ref(), &id).await;

    let mut session = state.session.lock().await;
    apply_lookup(&mut session, ticket, outcome);
    Ok(view(&session, &state))
}

#[utoipa::path(
    get,
    path = "/launch",
    params(LaunchParams),
    responses(
        (status = 303, description = "Redirect to the SMART authorization endpoint"),
        (status = 200, description = "Authorization could not start; `error` is set", body = SessionView),
        (status = 409, description = "A claim is open", body = ErrorRes),
        (status = 503, description = "SMART launch is not configured", body = ErrorRes)
    )
)]
/// Start a SMART App Launch
#[axum::debug_handler]
pub async fn launch(
    State(state): State<AppState>,
    Query(params): Query<LaunchParams>,
) -> ApiResult<Response> {
    let launcher = launcher(&state)?;

    {
        let session = state.session.lock().await;
        if !matches!(session.state(), SessionState::Search { .. }) {
            return Err(ClaimError::SessionActive.into());
        }
    }

    match launcher.begin(params.launch).await {
        Ok(pending) => {
            let url = pending.authorize_url().to_string();
            state.session.lock().await.begin_login(pending)?;
            Ok(Redirect::to(&url).into_response())
        }
        Err(err) => {
            let mut session = state.session.lock().await;
            session.fail_login(&ClaimError::from(err));
            Ok(view(&session, &state).into_response())
        }
    }
}

#[utoipa::path(
    get,
    path = "/callback",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "State issued by /launch"),
        ("error" = Option<String>, Query, description = "Authorization server error code"),
        ("error_description" = Option<String>, Query, description = "Authorization server error text")
    ),
    responses(
        (status = 200, description = "Login and lookup finished; on failure `error` is set", body = SessionView),
        (status = 409, description = "A lookup or claim started while the user was away", body = ErrorRes),
        (status = 503, description = "SMART launch is not configured", body = ErrorRes)
    )
)]
/// Complete a SMART App Launch and open a claim for the launch patient
#[axum::debug_handler]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Json<SessionView>> {
    let launcher = launcher(&state)?;

    let pending = {
        let mut session = state.session.lock().await;
        match session.take_pending_login(params.state.as_deref()) {
            Ok(pending) => pending,
            Err(err) => {
                session.report_error(&err);
                return Ok(view(&session, &state));
            }
        }
    };

    let outcome = launcher
        .complete(&pending, params)
        .await
        .map(|client| Arc::new(client) as Arc<dyn FhirClient>);

    let (ticket, client) = {
        let mut session = state.session.lock().await;
        match session.finish_login(outcome) {
            Ok(ticket) => (ticket, session.client()),
            Err(ClaimError::Authorization(_)) => return Ok(view(&session, &state)),
            Err(other) => return Err(other.into()),
        }
    };

    let outcome = load_current_patient(client.as_ref()).await;

    let mut session = state.session.lock().await;
    apply_lookup(&mut session, ticket, outcome);
    Ok(view(&session, &state))
}

#[utoipa::path(
    post,
    path = "/session/encounter",
    request_body = SelectEncounterReq,
    responses(
        (status = 200, description = "Encounter selected", body = SessionView),
        (status = 400, description = "Unknown encounter", body = ErrorRes),
        (status = 409, description = "Not selecting an encounter", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn select_encounter(
    State(state): State<AppState>,
    Json(req): Json<SelectEncounterReq>,
) -> ApiResult<Json<SessionView>> {
    let mut session = state.session.lock().await;
    session.wizard_mut()?.select_encounter(&req.encounter_id)?;
    Ok(view(&session, &state))
}

#[utoipa::path(
    post,
    path = "/session/conditions/{id}/toggle",
    params(("id" = String, Path, description = "Condition id")),
    responses(
        (status = 200, description = "Selection changed", body = SessionView),
        (status = 400, description = "Unknown condition", body = ErrorRes),
        (status = 409, description = "Not adding details", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn toggle_condition(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let mut session = state.session.lock().await;
    session.wizard_mut()?.toggle_condition(&id)?;
    Ok(view(&session, &state))
}

#[utoipa::path(
    post,
    path = "/session/procedures/{id}/toggle",
    params(("id" = String, Path, description = "Procedure id")),
    responses(
        (status = 200, description = "Selection changed", body = SessionView),
        (status = 400, description = "Unknown procedure", body = ErrorRes),
        (status = 409, description = "Not adding details", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn toggle_procedure(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let mut session = state.session.lock().await;
    session.wizard_mut()?.toggle_procedure(&id)?;
    Ok(view(&session, &state))
}

#[utoipa::path(
    post,
    path = "/session/review",
    responses(
        (status = 200, description = "Reviewing; the summary may still be pending", body = SessionView),
        (status = 400, description = "No diagnosis or no procedure selected", body = ErrorRes),
        (status = 409, description = "Not adding details", body = ErrorRes)
    )
)]
/// Move to the review step
///
/// The plain-language summary is generated in the background; poll `GET /session` for it.
#[axum::debug_handler]
pub async fn review(State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    let mut session = state.session.lock().await;
    let wizard = session.wizard_mut()?;

    if let Some(ticket) = wizard.review()? {
        let (diagnoses, procedures) = wizard.generation_input();
        let task_state = state.clone();
        tokio::spawn(async move {
            let outcome = task_state
                .writer
                .patient_summary(&diagnoses, &procedures)
                .await;
            let mut session = task_state.session.lock().await;
            if let Ok(wizard) = session.wizard_mut() {
                match outcome {
                    Ok(text) => {
                        wizard.complete_summary(ticket, text);
                    }
                    Err(err) => {
                        wizard.fail_summary(ticket, &err);
                    }
                }
            }
        });
    }

    Ok(view(&session, &state))
}

#[utoipa::path(
    post,
    path = "/session/back",
    responses(
        (status = 200, description = "Moved back one step", body = SessionView),
        (status = 409, description = "No earlier step is reachable", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn back(State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    let mut session = state.session.lock().await;
    session.wizard_mut()?.back()?;
    Ok(view(&session, &state))
}

#[utoipa::path(
    post,
    path = "/session/justify",
    responses(
        (status = 200, description = "Submitted, or still reviewing with `justification.error` set", body = SessionView),
        (status = 409, description = "Not reviewing, or a justification is already running", body = ErrorRes)
    )
)]
/// Generate the clinical justification and submit the claim
#[axum::debug_handler]
pub async fn justify(State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    let (ticket, diagnoses, procedures) = {
        let mut session = state.session.lock().await;
        let wizard = session.wizard_mut()?;
        let ticket = wizard.request_justification()?;
        let (diagnoses, procedures) = wizard.generation_input();
        (ticket, diagnoses, procedures)
    };

    let outcome = state
        .writer
        .clinical_justification(&diagnoses, &procedures)
        .await;

    let mut session = state.session.lock().await;
    if let Ok(wizard) = session.wizard_mut() {
        match outcome {
            Ok(text) => {
                wizard.complete_justification(ticket, text);
            }
            Err(err) => {
                wizard.fail_justification(ticket, &err);
            }
        }
    }
    Ok(view(&session, &state))
}

#[utoipa::path(
    post,
    path = "/session/reset",
    responses(
        (status = 200, description = "Back to an empty search", body = SessionView)
    )
)]
#[axum::debug_handler]
pub async fn reset(State(state): State<AppState>) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    session.reset();
    view(&session, &state)
}
