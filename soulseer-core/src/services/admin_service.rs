// File: src/services/admin_service.rs

use uuid::Uuid;

use soulseer_common::models::{Reader, Session, User, UserRole};
use crate::repositories::Stores;
use crate::services::require_admin;
use crate::Error;

/// Platform-wide listings for the admin dashboard. Every call checks the actor.
pub struct AdminService {
    stores: Stores,
}

impl AdminService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// All accounts, or only those holding `role`. Newest first.
    pub async fn list_users(&self, actor: Uuid, role: Option<UserRole>) -> Result<Vec<User>, Error> {
        require_admin(&self.stores, actor).await?;
        match role {
            Some(role) => self.stores.users.list_users_by_role(role).await,
            None => self.stores.users.list_users().await,
        }
    }

    /// Includes readers still waiting for approval.
    pub async fn list_readers(&self, actor: Uuid) -> Result<Vec<Reader>, Error> {
        require_admin(&self.stores, actor).await?;
        self.stores.readers.list_readers().await
    }

    pub async fn list_sessions(&self, actor: Uuid) -> Result<Vec<Session>, Error> {
        require_admin(&self.stores, actor).await?;
        self.stores.sessions.list_sessions().await
    }
}
