use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use voya_domain::ReservationError;

#[derive(Debug)]
pub enum AppError {
    Authentication(String),
    Reservation(ReservationError),
    Internal(anyhow::Error),
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        Self::Reservation(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Reservation(ReservationError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Reservation(ReservationError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Reservation(ReservationError::Forbidden(msg)) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Reservation(ReservationError::Conflict(report)) => (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": report.message,
                    "succeeded": report.succeeded,
                    "rejections": report.rejections,
                })),
            )
                .into_response(),
            AppError::Reservation(ReservationError::Ledger(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}
