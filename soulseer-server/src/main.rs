use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod context;
mod api;
mod server;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Durable storage; migrations are applied on startup.
    Postgres,
    /// Process-local storage for development. Lost on exit.
    Memory,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "soulseer")]
#[command(author, version, about = "SoulSeer - pay-per-minute reading sessions")]
pub struct Args {
    /// Address to which the HTTP server will bind
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8080")]
    pub server_addr: String,

    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://soulseer@localhost:5432/soulseer")]
    pub database_url: String,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    #[arg(long, env = "STORAGE", value_enum, default_value_t = StorageBackend::Postgres)]
    pub storage: StorageBackend,

    /// Without a key, deposit and payout routes answer 503.
    #[arg(long, env = "STRIPE_SECRET_KEY")]
    pub stripe_secret_key: Option<String>,

    /// Base URL used for checkout and onboarding return links
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8080")]
    pub public_base_url: String,

    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 15)]
    pub sweep_interval_secs: u64,

    /// Create demo accounts when the store has no admin yet
    #[arg(long, default_value = "false")]
    pub seed_demo: bool,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("soulseer=info".parse().unwrap_or_default());
    if let Err(e) = fmt().with_env_filter(filter).try_init() {
        eprintln!("Failed to set global subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "SoulSeer starting. addr={}, storage={:?}, sweep={}s",
        args.server_addr, args.storage, args.sweep_interval_secs
    );

    if let Err(e) = server::run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e.into());
    }

    info!("Main finished. Goodbye!");
    Ok(())
}
