use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use codeforces_hub_libs::{api::ErrorResponse, CodeforcesError};

/// Error half of every handler, rendered as `{ "error": ..., "kind": ... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: impl ToString, message: impl ToString) -> Self {
        Self {
            status,
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }

    pub fn validation(message: impl ToString) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "ValidationError",
            format!("invalid parameter: {}", message.to_string()),
        )
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NotFoundError",
            format!("no route for {}", path),
        )
    }

    /// Any upstream failure of the listing is a bad gateway, including a 404 on the contest list.
    pub fn from_listing(e: &CodeforcesError) -> Self {
        let status = match e {
            CodeforcesError::Validation(_) => StatusCode::BAD_REQUEST,
            CodeforcesError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            CodeforcesError::Upstream { .. } | CodeforcesError::MalformedUpstream(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self::new(status, e.kind(), e)
    }

    pub fn from_problem(e: &CodeforcesError) -> Self {
        let status = match e {
            CodeforcesError::Validation(_) => StatusCode::BAD_REQUEST,
            CodeforcesError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            CodeforcesError::Upstream { .. } | CodeforcesError::MalformedUpstream(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self::new(status, e.kind(), e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message, self.kind))).into_response()
    }
}
