//! soulseer-server/src/context.rs
//!
//! The global server context: storage, event bus, realtime channels and every
//! service the HTTP layer calls.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use soulseer_core::auth::{AuthResolver, HeaderAuthResolver};
use soulseer_core::clock::{Clock, SystemClock};
use soulseer_core::db::Database;
use soulseer_core::eventbus::EventBus;
use soulseer_core::payments::{PaymentProvider, StripeClient};
use soulseer_core::realtime::ChannelManager;
use soulseer_core::repositories::Stores;
use soulseer_core::seed::seed_demo;
use soulseer_core::services::{
    AdminService, DepositService, LedgerService, MessageService, MeteringService, PayoutService,
    ReaderService,
};
use soulseer_core::{Error, MeteringConfig};

use crate::{Args, StorageBackend};

pub struct ServerContext {
    /// `None` when running on in-memory storage.
    pub db: Option<Database>,
    pub stores: Stores,
    pub event_bus: Arc<EventBus>,
    pub channels: Arc<ChannelManager>,
    pub auth: Arc<dyn AuthResolver>,
    pub config: MeteringConfig,

    pub metering: Arc<MeteringService>,
    pub messages: Arc<MessageService>,
    pub ledger: Arc<LedgerService>,
    pub readers: Arc<ReaderService>,
    pub admin: Arc<AdminService>,

    /// Both need a payment provider; absent when none is configured.
    pub deposits: Option<Arc<DepositService>>,
    pub payouts: Option<Arc<PayoutService>>,
}

impl ServerContext {
    /// Creates and configures the entire context from the command line.
    pub async fn new(args: &Args) -> Result<Self, Error> {
        // 1) Storage
        let (db, stores) = match args.storage {
            StorageBackend::Postgres => {
                info!("Using Postgres DB URL: {}", args.database_url);
                let db = Database::connect(&args.database_url, args.max_connections).await?;
                db.migrate().await?;
                let stores = Stores::postgres(db.pool().clone());
                (Some(db), stores)
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage; all data is lost on exit.");
                (None, Stores::in_memory())
            }
        };

        if args.seed_demo {
            if let Some(demo) = seed_demo(&stores).await? {
                info!(
                    "Seeded demo data: admin={}, client={}, readers={}",
                    demo.admin.user_id,
                    demo.client.user_id,
                    demo.readers.len()
                );
            }
        }

        // 2) Payment provider
        let provider: Option<Arc<dyn PaymentProvider + Send + Sync>> =
            match args.stripe_secret_key.as_deref() {
                Some(key) if !key.trim().is_empty() => {
                    Some(Arc::new(StripeClient::new(key, &args.public_base_url)))
                }
                _ => {
                    warn!("STRIPE_SECRET_KEY not set; deposits and payouts are disabled.");
                    None
                }
            };

        // 3) Services
        let config = MeteringConfig {
            sweep_interval: Duration::from_secs(args.sweep_interval_secs.max(1)),
            ..MeteringConfig::default()
        };
        let mut ctx = Self::from_parts(stores, provider, Arc::new(SystemClock), config);
        ctx.db = db;
        Ok(ctx)
    }

    /// Wires services over already-built stores.
    pub fn from_parts(
        stores: Stores,
        provider: Option<Arc<dyn PaymentProvider + Send + Sync>>,
        clock: Arc<dyn Clock>,
        config: MeteringConfig,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let channels = Arc::new(ChannelManager::new());

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
            clock,
            config.max_message_len,
        ));
        let ledger = Arc::new(LedgerService::new(stores.clone()));
        let readers = Arc::new(ReaderService::new(stores.clone()));
        let admin = Arc::new(AdminService::new(stores.clone()));

        let deposits = provider.as_ref().map(|p| {
            Arc::new(DepositService::new(
                ledger.clone(),
                p.clone(),
                event_bus.clone(),
                config.clone(),
            ))
        });
        let payouts = provider.map(|p| {
            Arc::new(PayoutService::new(
                stores.clone(),
                p,
                event_bus.clone(),
                config.clone(),
            ))
        });

        Self {
            db: None,
            stores,
            event_bus,
            channels,
            auth: Arc::new(HeaderAuthResolver),
            config,
            metering,
            messages,
            ledger,
            readers,
            admin,
            deposits,
            payouts,
        }
    }
}
