//! # API REST
//!
//! REST API for the claim wizard.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation
//! - REST-specific concerns (JSON serialisation, CORS, status codes)
//!
//! A browser front-end drives one shared [`claim_core::Session`] through these endpoints and
//! renders the [`views::SessionView`] each of them returns.

#![warn(rust_2018_idioms)]

mod error;
pub mod handlers;
pub mod state;
pub mod views;

use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::get_session,
        handlers::search_patient,
        handlers::launch,
        handlers::callback,
        handlers::select_encounter,
        handlers::toggle_condition,
        handlers::toggle_procedure,
        handlers::review,
        handlers::back,
        handlers::justify,
        handlers::reset,
    ),
    components(schemas(
        views::HealthRes,
        views::ErrorRes,
        views::SearchReq,
        views::SelectEncounterReq,
        views::SessionStatus,
        views::SessionView,
        views::ClaimView,
        views::StepView,
        views::PatientView,
        views::EncounterView,
        views::CodedItemView,
        views::GenerationView,
        views::SubmittedClaimView,
    ))
)]
pub struct ApiDoc;

/// Build the REST router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/session", get(handlers::get_session))
        .route("/patients/search", post(handlers::search_patient))
        .route("/launch", get(handlers::launch))
        .route("/callback", get(handlers::callback))
        .route("/session/encounter", post(handlers::select_encounter))
        .route(
            "/session/conditions/:id/toggle",
            post(handlers::toggle_condition),
        )
        .route(
            "/session/procedures/:id/toggle",
            post(handlers::toggle_procedure),
        )
        .route("/session/review", post(handlers::review))
        .route("/session/back", post(handlers::back))
        .route("/session/justify", post(handlers::justify))
        .route("/session/reset", post(handlers::reset))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
