use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    Message, PayoutReservation, Reader, ReaderRates, Session, Settlement, Transaction, User,
    UserRole,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), Error>;
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error>;
    /// Newest first.
    async fn list_users(&self) -> Result<Vec<User>, Error>;
    async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<User>, Error>;
    async fn set_role(&self, user_id: Uuid, role: UserRole) -> Result<(), Error>;
}

#[async_trait]
pub trait ReaderRepository: Send + Sync {
    async fn create_reader(&self, reader: &Reader) -> Result<(), Error>;
    async fn get_reader(&self, reader_id: Uuid) -> Result<Option<Reader>, Error>;
    async fn get_reader_by_user_id(&self, user_id: Uuid) -> Result<Option<Reader>, Error>;

    /// The mutators below return the updated row, or `None` if there is no such reader.
    async fn set_online(&self, reader_id: Uuid, is_online: bool) -> Result<Option<Reader>, Error>;
    async fn update_rates(&self, reader_id: Uuid, rates: &ReaderRates) -> Result<Option<Reader>, Error>;
    async fn approve(&self, reader_id: Uuid) -> Result<Option<Reader>, Error>;
    async fn set_payout_account(&self, reader_id: Uuid, account_id: &str) -> Result<Option<Reader>, Error>;
    async fn mark_payout_onboarded(&self, reader_id: Uuid) -> Result<Option<Reader>, Error>;

    /// Every profile, approved or not. Newest first.
    async fn list_readers(&self) -> Result<Vec<Reader>, Error>;
    async fn list_approved_readers(&self) -> Result<Vec<Reader>, Error>;
    /// Online AND approved.
    async fn list_online_readers(&self) -> Result<Vec<Reader>, Error>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Fails with `Error::SessionAlreadyActive` when the client already has an active session.
    async fn create_session(&self, session: &Session) -> Result<(), Error>;
    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, Error>;
    /// Newest first.
    async fn list_sessions_for_client(&self, client_id: Uuid) -> Result<Vec<Session>, Error>;
    /// Newest first.
    async fn list_sessions_for_reader(&self, reader_id: Uuid) -> Result<Vec<Session>, Error>;
    async fn list_active_sessions(&self) -> Result<Vec<Session>, Error>;
    /// Every session on the platform. Newest first.
    async fn list_sessions(&self) -> Result<Vec<Session>, Error>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create_message(&self, message: &Message) -> Result<(), Error>;
    /// Ascending by `created_at`.
    async fn list_messages_for_session(&self, session_id: Uuid) -> Result<Vec<Message>, Error>;
    /// Messages `user_id` sent or received, in any session. Newest first.
    async fn list_messages_for_user(&self, user_id: Uuid) -> Result<Vec<Message>, Error>;
    /// Marks every unread message from `sender_id` to `receiver_id` as read. Returns how many changed.
    async fn mark_messages_read(&self, sender_id: Uuid, receiver_id: Uuid) -> Result<u64, Error>;
}

/// Balance and payout mutations. Every method is a single atomic unit at the
/// storage layer; no method is implemented as a read followed by a write.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// `balance += amount` and append `record`. Returns the new balance.
    async fn credit_balance(&self, user_id: Uuid, amount: Decimal, record: &Transaction) -> Result<Decimal, Error>;

    /// `balance -= amount` only if `balance >= amount`, and append `record`.
    /// Returns the new balance, or `None` when funds were insufficient.
    async fn debit_balance(&self, user_id: Uuid, amount: Decimal, record: &Transaction) -> Result<Option<Decimal>, Error>;

    /// Like `credit_balance`, but applied at most once per `record.reference_id`.
    /// Returns `None` when that reference was already credited.
    async fn credit_deposit(&self, user_id: Uuid, amount: Decimal, record: &Transaction) -> Result<Option<Decimal>, Error>;

    /// `pending_payout += amount` and `total_earnings += amount`, together.
    async fn accrue_payout(&self, reader_id: Uuid, amount: Decimal) -> Result<(), Error>;

    /// Transition the session `active -> completed`, freeze its charges, debit
    /// the client, credit the reader and append both records, all or nothing.
    /// Returns `None` (and changes nothing) if the session was not active.
    async fn settle_session(&self, settlement: &Settlement) -> Result<Option<Session>, Error>;

    /// Zero the reader's pending payout if it is at least `minimum`.
    async fn reserve_pending_payout(&self, reader_id: Uuid, minimum: Decimal) -> Result<PayoutReservation, Error>;

    /// Give back a reservation whose transfer failed.
    async fn restore_pending_payout(&self, reader_id: Uuid, amount: Decimal) -> Result<(), Error>;

    async fn record_transaction(&self, record: &Transaction) -> Result<(), Error>;

    /// Newest first.
    async fn list_transactions_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>, Error>;
}
