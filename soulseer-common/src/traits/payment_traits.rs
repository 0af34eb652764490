use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{DepositCheckout, DepositStatus, PayoutAccountStatus};

/// Moves money in and out through an external provider. Every call is a
/// remote, possibly-failing operation.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_deposit(&self, user_id: Uuid, amount: Decimal) -> Result<DepositCheckout, Error>;
    async fn confirm_deposit(&self, provider_session_id: &str) -> Result<DepositStatus, Error>;
    async fn create_payout_account(&self, reader_id: Uuid, email: &str) -> Result<String, Error>;
    async fn create_onboarding_link(&self, account_id: &str) -> Result<String, Error>;
    async fn payout_account_status(&self, account_id: &str) -> Result<PayoutAccountStatus, Error>;

    /// `idempotency_key` makes a retried transfer a no-op on the provider side.
    async fn transfer_payout(&self, account_id: &str, amount: Decimal, idempotency_key: &str) -> Result<String, Error>;
}
