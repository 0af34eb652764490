// soulseer-core/src/db/mod.rs
//
// Owns the Postgres pool. Repositories get a clone of the pool; the server
// keeps the `Database` for migrations, health checks and the final close.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use tracing::{info, warn};

use crate::Error;

/// Requests that wait longer than this for a connection fail instead of
/// queueing behind a stuck settlement.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;
        info!(max_connections, "Postgres pool ready.");
        Ok(Self { pool })
    }

    /// Wraps a pool built elsewhere (tests).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies everything under `migrations/` that has not run yet.
    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Schema is up to date.");
        Ok(())
    }

    /// Round-trips a trivial query.
    pub async fn ping(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            warn!("Postgres ping failed: {}", e);
            Error::Database(e)
        })?;
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Postgres pool closed.");
    }
}
