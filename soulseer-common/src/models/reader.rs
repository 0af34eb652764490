use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::money::usd;
use crate::models::session::SessionType;

/// Per-minute prices for the three consultation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderRates {
    pub chat_rate: Decimal,
    pub voice_rate: Decimal,
    pub video_rate: Decimal,
}

impl Default for ReaderRates {
    fn default() -> Self {
        Self {
            chat_rate: usd(399),
            voice_rate: usd(499),
            video_rate: usd(599),
        }
    }
}

/// A reader profile, bound 1:1 to a `User` through `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reader {
    pub reader_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub is_online: bool,
    pub is_approved: bool,
    pub chat_rate: Decimal,
    pub voice_rate: Decimal,
    pub video_rate: Decimal,
    pub total_readings: i32,
    pub total_earnings: Decimal,
    pub pending_payout: Decimal,
    pub payout_account_id: Option<String>,
    pub payout_onboarded: bool,
    pub created_at: DateTime<Utc>,
}

impl Reader {
    pub fn new(user_id: Uuid, display_name: &str, rates: ReaderRates) -> Self {
        Self {
            reader_id: Uuid::new_v4(),
            user_id,
            display_name: display_name.to_string(),
            is_online: false,
            is_approved: false,
            chat_rate: rates.chat_rate,
            voice_rate: rates.voice_rate,
            video_rate: rates.video_rate,
            total_readings: 0,
            total_earnings: Decimal::ZERO,
            pending_payout: Decimal::ZERO,
            payout_account_id: None,
            payout_onboarded: false,
            created_at: Utc::now(),
        }
    }

    pub fn rate_for(&self, session_type: SessionType) -> Decimal {
        match session_type {
            SessionType::Chat => self.chat_rate,
            SessionType::Voice => self.voice_rate,
            SessionType::Video => self.video_rate,
        }
    }

    pub fn rates(&self) -> ReaderRates {
        ReaderRates {
            chat_rate: self.chat_rate,
            voice_rate: self.voice_rate,
            video_rate: self.video_rate,
        }
    }

    /// Offline or unapproved readers cannot accept new sessions.
    pub fn is_available(&self) -> bool {
        self.is_online && self.is_approved
    }
}
