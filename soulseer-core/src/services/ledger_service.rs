// File: src/services/ledger_service.rs

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use soulseer_common::models::money::is_whole_cents;
use soulseer_common::models::{Transaction, TransactionKind};
use crate::repositories::Stores;
use crate::Error;

/// Balance and earnings arithmetic. All mutations are single atomic store
/// calls; nothing here reads a balance and writes it back.
pub struct LedgerService {
    stores: Stores,
}

fn validate_amount(amount: Decimal) -> Result<(), Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!("{amount} must be positive")));
    }
    if !is_whole_cents(amount) {
        return Err(Error::InvalidAmount(format!("{amount} has fractional cents")));
    }
    Ok(())
}

impl LedgerService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<Decimal, Error> {
        let user = self
            .stores
            .users
            .get_user(user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;
        Ok(user.balance)
    }

    /// Takes `amount` from the user's balance if they hold at least that much.
    /// Records a negative transaction of `kind`. Returns the new balance.
    ///
    /// For balance changes outside a session (purchases, manual adjustments).
    /// Session charges go through settlement instead.
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
        description: &str,
        reference: (&str, &str),
    ) -> Result<Decimal, Error> {
        validate_amount(amount)?;
        let (reference_id, reference_type) = reference;
        let record = Transaction::new(user_id, kind, -amount, description, reference_id, reference_type);

        match self.stores.ledger.debit_balance(user_id, amount, &record).await? {
            Some(balance) => {
                info!("Debited {} from user {} ({:?}); balance now {}", amount, user_id, kind, balance);
                Ok(balance)
            }
            None => Err(Error::InsufficientBalance {
                required: amount,
                available: self.balance(user_id).await?,
            }),
        }
    }

    /// Adds `amount` to the user's balance and records it. Returns the new balance.
    /// Like `debit`, this is for non-session changes such as refunds.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
        description: &str,
        reference: (&str, &str),
    ) -> Result<Decimal, Error> {
        validate_amount(amount)?;
        let (reference_id, reference_type) = reference;
        let record = Transaction::new(user_id, kind, amount, description, reference_id, reference_type);
        let balance = self.stores.ledger.credit_balance(user_id, amount, &record).await?;
        info!("Credited {} to user {} ({:?}); balance now {}", amount, user_id, kind, balance);
        Ok(balance)
    }

    /// Credits a provider deposit at most once per `provider_reference`.
    /// Returns `None` if that reference was already applied.
    pub async fn credit_deposit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        provider_reference: &str,
        reference_type: &str,
    ) -> Result<Option<Decimal>, Error> {
        validate_amount(amount)?;
        let record = Transaction::new(
            user_id,
            TransactionKind::Deposit,
            amount,
            "Balance deposit",
            provider_reference,
            reference_type,
        );
        self.stores.ledger.credit_deposit(user_id, amount, &record).await
    }

    /// Raises `pending_payout` and `total_earnings` together.
    pub async fn accrue_payout(&self, reader_id: Uuid, amount: Decimal) -> Result<(), Error> {
        validate_amount(amount)?;
        self.stores.ledger.accrue_payout(reader_id, amount).await
    }

    pub async fn list_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>, Error> {
        self.stores.ledger.list_transactions_for_user(user_id).await
    }
}
