// ================================================================
// File: soulseer-common/src/error.rs
// ================================================================

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    // Session / reader availability:
    #[error("Reader is not available")]
    ReaderUnavailable,

    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Reader not found: {0}")]
    ReaderNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate changed: quoted {quoted}, current {current}")]
    RateChanged { quoted: Decimal, current: Decimal },

    #[error("Client already has an active session")]
    SessionAlreadyActive,

    #[error("Session {0} is not active")]
    SessionNotActive(Uuid),

    // Ledger / payouts:
    #[error("Minimum payout is {minimum} (pending {pending})")]
    PayoutTooSmall { pending: Decimal, minimum: Decimal },

    #[error("Payout onboarding is incomplete")]
    OnboardingIncomplete,

    #[error("Settlement failure: {0}")]
    SettlementFailure(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Deposit has not been paid")]
    DepositNotPaid,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    // Infrastructure:
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors the caller caused and can act on (add funds, pick another reader...).
    /// Everything else is logged server-side and shown as a generic failure.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Error::SettlementFailure(_)
                | Error::PaymentProvider(_)
                | Error::Database(_)
                | Error::Migration(_)
                | Error::Http(_)
                | Error::Json(_)
                | Error::Io(_)
        )
    }
}
