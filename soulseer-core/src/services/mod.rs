// File: src/services/mod.rs

pub mod metering_service;
pub mod message_service;
pub mod ledger_service;
pub mod payout_service;
pub mod deposit_service;
pub mod reader_service;
pub mod admin_service;

pub use metering_service::MeteringService;
pub use message_service::MessageService;
pub use ledger_service::LedgerService;
pub use payout_service::PayoutService;
pub use deposit_service::DepositService;
pub use reader_service::ReaderService;
pub use admin_service::AdminService;

use uuid::Uuid;

use soulseer_common::models::{Reader, Session, User};
use crate::repositories::Stores;
use crate::Error;

/// The two users allowed to act on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participants {
    pub client_user_id: Uuid,
    pub reader_user_id: Uuid,
}

impl Participants {
    pub fn contains(&self, user_id: Uuid) -> bool {
        user_id == self.client_user_id || user_id == self.reader_user_id
    }

    /// The participant on the other side from `user_id`, if `user_id` is one.
    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.client_user_id {
            Some(self.reader_user_id)
        } else if user_id == self.reader_user_id {
            Some(self.client_user_id)
        } else {
            None
        }
    }
}

pub(crate) async fn load_session(stores: &Stores, session_id: Uuid) -> Result<Session, Error> {
    stores
        .sessions
        .get_session(session_id)
        .await?
        .ok_or(Error::SessionNotFound(session_id))
}

pub(crate) async fn load_reader(stores: &Stores, reader_id: Uuid) -> Result<Reader, Error> {
    stores
        .readers
        .get_reader(reader_id)
        .await?
        .ok_or(Error::ReaderNotFound(reader_id))
}

pub(crate) async fn is_admin(stores: &Stores, user_id: Uuid) -> Result<bool, Error> {
    Ok(stores
        .users
        .get_user(user_id)
        .await?
        .map(|u| u.is_admin())
        .unwrap_or(false))
}

/// `Forbidden` unless `actor` is an admin.
pub(crate) async fn require_admin(stores: &Stores, actor: Uuid) -> Result<User, Error> {
    match stores.users.get_user(actor).await? {
        Some(user) if user.is_admin() => Ok(user),
        _ => Err(Error::Forbidden("Admin only".into())),
    }
}

/// The reader profile owned by `user_id`; `Forbidden` if there is none.
pub(crate) async fn reader_for_user(stores: &Stores, user_id: Uuid) -> Result<Reader, Error> {
    stores
        .readers
        .get_reader_by_user_id(user_id)
        .await?
        .ok_or_else(|| Error::Forbidden("No reader profile for this user".into()))
}

pub(crate) async fn participants_of(stores: &Stores, session: &Session) -> Result<Participants, Error> {
    let reader = load_reader(stores, session.reader_id).await?;
    Ok(Participants {
        client_user_id: session.client_id,
        reader_user_id: reader.user_id,
    })
}

/// Loads the session and checks `actor` takes part in it.
pub(crate) async fn session_for_participant(
    stores: &Stores,
    actor: Uuid,
    session_id: Uuid,
) -> Result<(Session, Participants), Error> {
    let session = load_session(stores, session_id).await?;
    let participants = participants_of(stores, &session).await?;
    if !participants.contains(actor) {
        return Err(Error::Forbidden("Not a participant of this session".into()));
    }
    Ok((session, participants))
}
