//! Error taxonomy shared by the match engine and the HTTP adapter (§7).
//!
//! `Ignored` deliberately never reaches this enum — `Match::move_piece`
//! absorbs a failed legality check into `Ok(MoveOutcome::Ignored)` so a
//! client mis-click can never surface as an error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: match is not in the right state ({0})")]
    ForbiddenState(String),
    #[error("forbidden: {0}")]
    ForbiddenActor(String),
    #[error("internal invariant violated: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for MatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            MatchError::BadRequest(_) => StatusCode::BAD_REQUEST,
            MatchError::NotFound(_) => StatusCode::NOT_FOUND,
            MatchError::ForbiddenState(_) | MatchError::ForbiddenActor(_) => StatusCode::FORBIDDEN,
            MatchError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if matches!(self, MatchError::InternalError(_)) {
            tracing::error!(error = %self, "invariant violation");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
