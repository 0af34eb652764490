// File: src/services/deposit_service.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use soulseer_common::models::money::is_whole_cents;
use soulseer_common::models::DepositCheckout;
use soulseer_common::traits::payment_traits::PaymentProvider;
use crate::config::MeteringConfig;
use crate::eventbus::{EventBus, MarketEvent};
use crate::services::LedgerService;
use crate::Error;

pub const CHECKOUT_REFERENCE: &str = "stripe_checkout";

pub struct DepositService {
    ledger: Arc<LedgerService>,
    provider: Arc<dyn PaymentProvider + Send + Sync>,
    event_bus: Arc<EventBus>,
    config: MeteringConfig,
}

impl DepositService {
    pub fn new(
        ledger: Arc<LedgerService>,
        provider: Arc<dyn PaymentProvider + Send + Sync>,
        event_bus: Arc<EventBus>,
        config: MeteringConfig,
    ) -> Self {
        Self { ledger, provider, event_bus, config }
    }

    pub async fn create_deposit(&self, user_id: Uuid, amount: Decimal) -> Result<DepositCheckout, Error> {
        if amount < self.config.minimum_deposit || amount > self.config.maximum_deposit {
            return Err(Error::InvalidAmount(format!(
                "Deposits must be between {} and {}",
                self.config.minimum_deposit, self.config.maximum_deposit
            )));
        }
        if !is_whole_cents(amount) {
            return Err(Error::InvalidAmount(format!("{amount} has fractional cents")));
        }
        // Fails early for unknown users.
        self.ledger.balance(user_id).await?;

        self.provider.create_deposit(user_id, amount).await
    }

    /// Credits a paid checkout to its owner. Confirming the same checkout
    /// again credits nothing and returns the current balance.
    pub async fn confirm_deposit(&self, user_id: Uuid, provider_session_id: &str) -> Result<Decimal, Error> {
        let status = self.provider.confirm_deposit(provider_session_id).await?;

        if !status.paid {
            return Err(Error::DepositNotPaid);
        }
        if status.user_id != Some(user_id) {
            return Err(Error::Forbidden("Deposit belongs to another user".into()));
        }
        if status.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!("{} is not a valid deposit", status.amount)));
        }

        match self
            .ledger
            .credit_deposit(user_id, status.amount, &status.provider_session_id, CHECKOUT_REFERENCE)
            .await?
        {
            Some(balance) => {
                info!("Deposit {} of {} credited to user {}", status.provider_session_id, status.amount, user_id);
                self.event_bus
                    .publish(MarketEvent::DepositConfirmed {
                        user_id,
                        amount: status.amount,
                        provider_session_id: status.provider_session_id,
                    })
                    .await;
                Ok(balance)
            }
            None => {
                info!("Deposit {} already credited; ignoring", status.provider_session_id);
                self.ledger.balance(user_id).await
            }
        }
    }
}
