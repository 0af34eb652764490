// soulseer-server/src/api/error.rs

use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::http::StatusCode;
use serde_json::json;
use tracing::error;

use soulseer_core::Error;

const GENERIC_FAILURE: &str = "Something went wrong on our side. Please try again.";

/// An `Error` rendered as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthenticated",
            message: "Sign in to continue.".into(),
        }
    }

    pub fn payments_disabled() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "payments_disabled",
            message: "Payments are not configured on this server.".into(),
        }
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InsufficientBalance { .. } | Error::DepositNotPaid => StatusCode::PAYMENT_REQUIRED,
        Error::Forbidden(_) => StatusCode::FORBIDDEN,
        Error::SessionNotFound(_) | Error::ReaderNotFound(_) | Error::UserNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        Error::ReaderUnavailable
        | Error::RateChanged { .. }
        | Error::SessionAlreadyActive
        | Error::SessionNotActive(_) => StatusCode::CONFLICT,
        Error::PayoutTooSmall { .. }
        | Error::OnboardingIncomplete
        | Error::InvalidAmount(_)
        | Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::PaymentProvider(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
        Error::SettlementFailure(_)
        | Error::Database(_)
        | Error::Migration(_)
        | Error::Json(_)
        | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn code_for(err: &Error) -> &'static str {
    match err {
        Error::ReaderUnavailable => "reader_unavailable",
        Error::InsufficientBalance { .. } => "insufficient_balance",
        Error::SessionNotFound(_) => "session_not_found",
        Error::ReaderNotFound(_) => "reader_not_found",
        Error::UserNotFound(_) => "user_not_found",
        Error::Forbidden(_) => "forbidden",
        Error::RateChanged { .. } => "rate_changed",
        Error::SessionAlreadyActive => "session_already_active",
        Error::SessionNotActive(_) => "session_not_active",
        Error::PayoutTooSmall { .. } => "payout_too_small",
        Error::OnboardingIncomplete => "onboarding_incomplete",
        Error::SettlementFailure(_) => "settlement_failure",
        Error::InvalidAmount(_) => "invalid_amount",
        Error::DepositNotPaid => "deposit_not_paid",
        Error::Validation(_) => "validation",
        Error::PaymentProvider(_) | Error::Http(_) => "payment_provider",
        Error::Database(_) | Error::Migration(_) | Error::Json(_) | Error::Io(_) => "internal",
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = status_for(&err);
        let code = code_for(&err);
        let message = if err.is_user_facing() {
            err.to_string()
        } else {
            error!("Request failed: {:?}", err);
            GENERIC_FAILURE.to_string()
        };
        Self { status, code, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": { "code": self.code, "message": self.message } });
        (self.status, Json(body)).into_response()
    }
}
