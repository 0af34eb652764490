// File: src/services/payout_service.rs

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use soulseer_common::models::{PayoutReservation, Reader, Transaction, TransactionKind};
use soulseer_common::traits::payment_traits::PaymentProvider;
use crate::config::MeteringConfig;
use crate::eventbus::{EventBus, MarketEvent};
use crate::repositories::Stores;
use crate::services::reader_for_user;
use crate::Error;

pub const TRANSFER_REFERENCE: &str = "stripe_transfer";

/// Reader payouts through the provider's connected accounts.
pub struct PayoutService {
    stores: Stores,
    provider: Arc<dyn PaymentProvider + Send + Sync>,
    event_bus: Arc<EventBus>,
    config: MeteringConfig,
}

impl PayoutService {
    pub fn new(
        stores: Stores,
        provider: Arc<dyn PaymentProvider + Send + Sync>,
        event_bus: Arc<EventBus>,
        config: MeteringConfig,
    ) -> Self {
        Self { stores, provider, event_bus, config }
    }

    /// Creates the reader's payout account on first use and returns a fresh
    /// onboarding URL.
    pub async fn start_onboarding(&self, actor: Uuid) -> Result<String, Error> {
        let reader = reader_for_user(&self.stores, actor).await?;

        let account_id = match reader.payout_account_id {
            Some(id) => id,
            None => {
                let user = self
                    .stores
                    .users
                    .get_user(actor)
                    .await?
                    .ok_or(Error::UserNotFound(actor))?;
                let id = self
                    .provider
                    .create_payout_account(reader.reader_id, &user.email)
                    .await?;
                self.stores
                    .readers
                    .set_payout_account(reader.reader_id, &id)
                    .await?
                    .ok_or(Error::ReaderNotFound(reader.reader_id))?;
                id
            }
        };

        self.provider.create_onboarding_link(&account_id).await
    }

    /// Asks the provider whether onboarding finished and records it once it has.
    pub async fn refresh_onboarding(&self, actor: Uuid) -> Result<Reader, Error> {
        let reader = reader_for_user(&self.stores, actor).await?;
        let Some(account_id) = reader.payout_account_id.as_deref() else {
            return Ok(reader);
        };
        if reader.payout_onboarded {
            return Ok(reader);
        }

        let status = self.provider.payout_account_status(account_id).await?;
        if !status.is_onboarded() {
            return Ok(reader);
        }

        info!("Reader {} completed payout onboarding", reader.reader_id);
        self.stores
            .readers
            .mark_payout_onboarded(reader.reader_id)
            .await?
            .ok_or(Error::ReaderNotFound(reader.reader_id))
    }

    /// Transfers the reader's whole pending payout.
    ///
    /// The pending amount is reserved (zeroed) atomically before the transfer
    /// and restored if the provider call fails, so two concurrent payouts can
    /// never both move the same money.
    pub async fn payout(&self, actor: Uuid) -> Result<Transaction, Error> {
        let reader = reader_for_user(&self.stores, actor).await?;
        let account_id = match (&reader.payout_account_id, reader.payout_onboarded) {
            (Some(id), true) => id.clone(),
            _ => return Err(Error::OnboardingIncomplete),
        };

        // 1) Reserve.
        let amount = match self
            .stores
            .ledger
            .reserve_pending_payout(reader.reader_id, self.config.minimum_payout)
            .await?
        {
            PayoutReservation::Reserved(amount) => amount,
            PayoutReservation::BelowMinimum(pending) => {
                return Err(Error::PayoutTooSmall {
                    pending,
                    minimum: self.config.minimum_payout,
                });
            }
        };

        // 2) Transfer. The key makes a retried request a no-op at the provider.
        let idempotency_key = format!("payout-{}-{}", reader.reader_id, Uuid::new_v4());
        let transfer_id = match self
            .provider
            .transfer_payout(&account_id, amount, &idempotency_key)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("Payout transfer of {} for reader {} failed: {:?}", amount, reader.reader_id, e);
                self.stores.ledger.restore_pending_payout(reader.reader_id, amount).await?;
                return Err(e);
            }
        };

        // 3) Audit record.
        let record = Transaction::new(
            reader.user_id,
            TransactionKind::Payout,
            -amount,
            "Reader payout",
            &transfer_id,
            TRANSFER_REFERENCE,
        );
        if let Err(e) = self.stores.ledger.record_transaction(&record).await {
            error!(
                "Payout {} of {} for reader {} succeeded but its record failed: {:?}",
                transfer_id, amount, reader.reader_id, e
            );
            return Err(e);
        }

        info!("Paid out {} to reader {} ({})", amount, reader.reader_id, transfer_id);
        self.event_bus
            .publish(MarketEvent::PayoutCompleted {
                reader_id: reader.reader_id,
                amount,
                transfer_id,
            })
            .await;

        Ok(record)
    }
}
