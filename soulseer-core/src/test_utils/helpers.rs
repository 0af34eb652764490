// File: soulseer-core/src/test_utils/helpers.rs

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use soulseer_common::models::{Reader, ReaderRates, User, UserRole};
use soulseer_common::traits::payment_traits::PaymentProvider;
use crate::clock::Clock;
use crate::config::MeteringConfig;
use crate::db::Database;
use crate::eventbus::EventBus;
use crate::realtime::ChannelManager;
use crate::repositories::{InMemoryStore, Stores};
use crate::services::{
    AdminService, DepositService, LedgerService, MessageService, MeteringService, PayoutService,
    ReaderService,
};
use crate::Error;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// A fully wired marketplace on the in-memory store with a manual clock.
pub struct TestMarket {
    pub stores: Stores,
    pub channels: Arc<ChannelManager>,
    pub event_bus: Arc<EventBus>,
    pub clock: Arc<ManualClock>,
    pub config: MeteringConfig,
    pub metering: Arc<MeteringService>,
    pub messages: Arc<MessageService>,
    pub ledger: Arc<LedgerService>,
    pub readers: Arc<ReaderService>,
    pub admin: Arc<AdminService>,
}

impl TestMarket {
    pub fn new() -> Self {
        Self::with_config(MeteringConfig::default())
    }

    pub fn with_config(config: MeteringConfig) -> Self {
        let stores = Stores::from_memory(Arc::new(InMemoryStore::new()));
        let channels = Arc::new(ChannelManager::new());
        let event_bus = Arc::new(EventBus::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let metering = Arc::new(MeteringService::new(
            stores.clone(),
            channels.clone(),
            event_bus.clone(),
            clock.clone(),
            config.clone(),
        ));
        let messages = Arc::new(MessageService::new(
            stores.clone(),
            channels.clone(),
            event_bus.clone(),
            clock.clone(),
            config.max_message_len,
        ));
        let ledger = Arc::new(LedgerService::new(stores.clone()));
        let readers = Arc::new(ReaderService::new(stores.clone()));
        let admin = Arc::new(AdminService::new(stores.clone()));

        Self {
            stores,
            channels,
            event_bus,
            clock,
            config,
            metering,
            messages,
            ledger,
            readers,
            admin,
        }
    }

    pub fn payouts(&self, provider: Arc<dyn PaymentProvider + Send + Sync>) -> PayoutService {
        PayoutService::new(self.stores.clone(), provider, self.event_bus.clone(), self.config.clone())
    }

    pub fn deposits(&self, provider: Arc<dyn PaymentProvider + Send + Sync>) -> DepositService {
        DepositService::new(self.ledger.clone(), provider, self.event_bus.clone(), self.config.clone())
    }

    pub async fn client_with_balance(&self, name: &str, balance: Decimal) -> Result<User, Error> {
        let mut user = User::new(name, &format!("{name}@example.com"), UserRole::Client);
        user.balance = balance;
        self.stores.users.create_user(&user).await?;
        Ok(user)
    }

    pub async fn admin(&self) -> Result<User, Error> {
        let user = User::new("admin", "admin@example.com", UserRole::Admin);
        self.stores.users.create_user(&user).await?;
        Ok(user)
    }

    /// An approved, online reader with the default rates.
    pub async fn online_reader(&self, name: &str) -> Result<(User, Reader), Error> {
        self.reader_with(name, ReaderRates::default(), true, true).await
    }

    pub async fn reader_with(
        &self,
        name: &str,
        rates: ReaderRates,
        online: bool,
        approved: bool,
    ) -> Result<(User, Reader), Error> {
        let user = User::new(name, &format!("{name}@example.com"), UserRole::Reader);
        self.stores.users.create_user(&user).await?;
        let mut reader = Reader::new(user.user_id, name, rates);
        reader.is_online = online;
        reader.is_approved = approved;
        self.stores.readers.create_reader(&reader).await?;
        Ok((user, reader))
    }

    pub async fn balance_of(&self, user_id: uuid::Uuid) -> Result<Decimal, Error> {
        self.ledger.balance(user_id).await
    }

    pub async fn reader(&self, reader_id: uuid::Uuid) -> Result<Reader, Error> {
        self.readers.get(reader_id).await
    }
}

impl Default for TestMarket {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool on the Postgres test database from `TEST_DATABASE_URL`.
pub async fn create_test_db_pool() -> Result<Pool<Postgres>, Error> {
    let url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://soulseer@localhost/soulseer_test".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    Ok(pool)
}

/// Wipes test data so each test starts fresh.
pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query("TRUNCATE TABLE transactions, messages, sessions, readers, users CASCADE")
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns a migrated, empty test DB handle.
pub async fn setup_test_database() -> Result<Database, Error> {
    let pool = create_test_db_pool().await?;
    let db = Database::from_pool(pool);
    db.migrate().await?;
    clean_database(db.pool()).await?;
    Ok(db)
}
