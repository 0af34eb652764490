// src/repositories/mod.rs

pub mod postgres;
pub mod memory;

use std::sync::Arc;
use sqlx::{Pool, Postgres};

pub use soulseer_common::traits::repository_traits::{
    LedgerRepository, MessageRepository, ReaderRepository, SessionRepository, UserRepository,
};
pub use memory::InMemoryStore;

use postgres::{
    PostgresLedgerRepository, PostgresMessageRepository, PostgresReaderRepository,
    PostgresSessionRepository, PostgresUserRepository,
};

/// One handle per entity store, shared by every service.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepository + Send + Sync>,
    pub readers: Arc<dyn ReaderRepository + Send + Sync>,
    pub sessions: Arc<dyn SessionRepository + Send + Sync>,
    pub messages: Arc<dyn MessageRepository + Send + Sync>,
    pub ledger: Arc<dyn LedgerRepository + Send + Sync>,
}

impl Stores {
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            readers: Arc::new(PostgresReaderRepository::new(pool.clone())),
            sessions: Arc::new(PostgresSessionRepository::new(pool.clone())),
            messages: Arc::new(PostgresMessageRepository::new(pool.clone())),
            ledger: Arc::new(PostgresLedgerRepository::new(pool)),
        }
    }

    /// Every store backed by the same in-memory state, so settlement stays atomic.
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(InMemoryStore::new()))
    }

    pub fn from_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            readers: store.clone(),
            sessions: store.clone(),
            messages: store.clone(),
            ledger: store,
        }
    }
}
