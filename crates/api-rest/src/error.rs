use crate::views::ErrorRes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use claim_core::ClaimError;

/// A request the session refused.
///
/// Collaborator failures (lookup, authorisation, text generation) are not returned this way; the
/// handlers record them on the session and respond with the session view.
#[derive(Debug)]
pub struct ApiError(pub ClaimError);

impl From<ClaimError> for ApiError {
    fn from(err: ClaimError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ClaimError::InvalidInput(_) | ClaimError::UnknownItem { .. } => StatusCode::BAD_REQUEST,
            ClaimError::InvalidTransition { .. }
            | ClaimError::Busy(_)
            | ClaimError::SessionActive
            | ClaimError::NoActiveSession => StatusCode::CONFLICT,
            ClaimError::InvalidConfig(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        } else {
            tracing::debug!("request rejected: {}", self.0);
        }
        (
            status,
            Json(ErrorRes {
                error: self.0.user_message(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
