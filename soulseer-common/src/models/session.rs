use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::money::round_cents;
use crate::models::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Chat,
    Voice,
    Video,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::Chat => write!(f, "chat"),
            SessionType::Voice => write!(f, "voice"),
            SessionType::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

/// Why a session was ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Participant,
    BalanceExhausted,
}

/// The billing unit: one timed consultation between a client and a reader.
///
/// `rate_per_minute` is snapshotted at creation. The four money fields and
/// `duration_minutes` are filled exactly once, when the session completes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: Uuid,
    pub client_id: Uuid,
    pub reader_id: Uuid,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub rate_per_minute: Decimal,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(rename = "duration")]
    pub duration_minutes: Option<i32>,
    pub total_cost: Option<Decimal>,
    pub reader_earnings: Option<Decimal>,
    pub platform_fee: Option<Decimal>,
    pub end_reason: Option<EndReason>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A new `active` session started at `now`.
    pub fn start(
        client_id: Uuid,
        reader_id: Uuid,
        session_type: SessionType,
        rate_per_minute: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            client_id,
            reader_id,
            session_type,
            status: SessionStatus::Active,
            rate_per_minute,
            started_at: Some(now),
            ended_at: None,
            duration_minutes: None,
            total_cost: None,
            reader_earnings: None,
            platform_fee: None,
            end_reason: None,
            created_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// What the session would cost if it ended at `at`.
    pub fn projected_cost(&self, at: DateTime<Utc>) -> Decimal {
        let started_at = self.started_at.unwrap_or(self.created_at);
        Decimal::from(billable_minutes(started_at, at)) * self.rate_per_minute
    }
}

/// Whole minutes billed for a session, rounded up. Never less than one.
pub fn billable_minutes(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> i64 {
    let elapsed_ms = (ended_at - started_at).num_milliseconds();
    if elapsed_ms <= 0 {
        return 1;
    }
    ((elapsed_ms + 59_999) / 60_000).max(1)
}

/// The frozen financial outcome of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCharges {
    pub duration_minutes: i64,
    pub total_cost: Decimal,
    pub reader_earnings: Decimal,
    pub platform_fee: Decimal,
}

impl SessionCharges {
    /// `total_cost` is exact; the reader's share is rounded to cents and the
    /// platform fee is its complement, so the two always sum to the total.
    pub fn compute(
        rate_per_minute: Decimal,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        reader_share: Decimal,
    ) -> Self {
        let duration_minutes = billable_minutes(started_at, ended_at);
        let total_cost = Decimal::from(duration_minutes) * rate_per_minute;
        let reader_earnings = round_cents(total_cost * reader_share);
        Self {
            duration_minutes,
            total_cost,
            reader_earnings,
            platform_fee: total_cost - reader_earnings,
        }
    }
}

/// Everything the store needs to complete a session atomically.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub session_id: Uuid,
    pub client_id: Uuid,
    pub reader_id: Uuid,
    pub ended_at: DateTime<Utc>,
    pub end_reason: EndReason,
    pub charges: SessionCharges,
    pub client_charge: Transaction,
    pub reader_earning: Transaction,
}
