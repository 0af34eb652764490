use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hosted checkout the client is redirected to in order to add funds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositCheckout {
    pub provider_session_id: String,
    pub redirect_url: String,
}

/// What the provider reports about a checkout.
#[derive(Debug, Clone)]
pub struct DepositStatus {
    pub provider_session_id: String,
    pub paid: bool,
    pub user_id: Option<Uuid>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutAccountStatus {
    pub details_submitted: bool,
    pub payouts_enabled: bool,
}

impl PayoutAccountStatus {
    pub fn is_onboarded(&self) -> bool {
        self.details_submitted && self.payouts_enabled
    }
}

/// Result of atomically taking a reader's pending payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutReservation {
    /// The pending amount was moved out; the reader now holds zero.
    Reserved(Decimal),
    /// Nothing was moved; this is what the reader has pending.
    BelowMinimum(Decimal),
}
