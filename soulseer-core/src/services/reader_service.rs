// File: src/services/reader_service.rs

use tracing::info;
use uuid::Uuid;

use rust_decimal::Decimal;

use soulseer_common::models::money::is_whole_cents;
use soulseer_common::models::{Reader, ReaderRates, UserRole};
use crate::repositories::Stores;
use crate::services::{is_admin, load_reader, require_admin};
use crate::Error;

fn validate_rates(rates: &ReaderRates) -> Result<(), Error> {
    for rate in [rates.chat_rate, rates.voice_rate, rates.video_rate] {
        if rate <= Decimal::ZERO || !is_whole_cents(rate) {
            return Err(Error::Validation(format!("Invalid per-minute rate {rate}")));
        }
    }
    Ok(())
}

pub struct ReaderService {
    stores: Stores,
}

impl ReaderService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Loads the reader and checks `actor` owns it (or, if `admin_ok`, is an admin).
    async fn owned_reader(&self, actor: Uuid, reader_id: Uuid, admin_ok: bool) -> Result<Reader, Error> {
        let reader = load_reader(&self.stores, reader_id).await?;
        if reader.user_id == actor || (admin_ok && is_admin(&self.stores, actor).await?) {
            Ok(reader)
        } else {
            Err(Error::Forbidden("Not your reader profile".into()))
        }
    }

    pub async fn get(&self, reader_id: Uuid) -> Result<Reader, Error> {
        load_reader(&self.stores, reader_id).await
    }

    pub async fn set_online(&self, actor: Uuid, reader_id: Uuid, is_online: bool) -> Result<Reader, Error> {
        self.owned_reader(actor, reader_id, true).await?;
        let reader = self
            .stores
            .readers
            .set_online(reader_id, is_online)
            .await?
            .ok_or(Error::ReaderNotFound(reader_id))?;
        info!("Reader {} is now {}", reader_id, if is_online { "online" } else { "offline" });
        Ok(reader)
    }

    /// New rates apply to sessions started afterwards; running sessions keep
    /// their snapshot.
    pub async fn update_rates(&self, actor: Uuid, reader_id: Uuid, rates: ReaderRates) -> Result<Reader, Error> {
        self.owned_reader(actor, reader_id, false).await?;
        validate_rates(&rates)?;
        self.stores
            .readers
            .update_rates(reader_id, &rates)
            .await?
            .ok_or(Error::ReaderNotFound(reader_id))
    }

    /// Admin only. Gives an existing account a reader profile and the reader
    /// role. The profile starts offline and unapproved.
    pub async fn create_reader(
        &self,
        actor: Uuid,
        user_id: Uuid,
        display_name: &str,
        rates: ReaderRates,
    ) -> Result<Reader, Error> {
        // 1) Permission and input
        require_admin(&self.stores, actor).await?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(Error::Validation("Display name is empty".into()));
        }
        validate_rates(&rates)?;

        // 2) Target account
        let user = self
            .stores
            .users
            .get_user(user_id)
            .await?
            .ok_or(Error::UserNotFound(user_id))?;
        if user.is_admin() {
            return Err(Error::Validation("Admins cannot hold a reader profile".into()));
        }

        // 3) Profile, then role
        let reader = Reader::new(user_id, display_name, rates);
        self.stores.readers.create_reader(&reader).await?;
        self.stores.users.set_role(user_id, UserRole::Reader).await?;

        info!("Reader {} ({}) created for user {} by {}", reader.reader_id, display_name, user_id, actor);
        Ok(reader)
    }

    pub async fn approve(&self, actor: Uuid, reader_id: Uuid) -> Result<Reader, Error> {
        require_admin(&self.stores, actor).await?;
        let reader = self
            .stores
            .readers
            .approve(reader_id)
            .await?
            .ok_or(Error::ReaderNotFound(reader_id))?;
        info!("Reader {} approved by {}", reader_id, actor);
        Ok(reader)
    }

    pub async fn list_approved(&self) -> Result<Vec<Reader>, Error> {
        self.stores.readers.list_approved_readers().await
    }

    pub async fn list_online(&self) -> Result<Vec<Reader>, Error> {
        self.stores.readers.list_online_readers().await
    }
}
