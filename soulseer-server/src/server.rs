//! soulseer-server/src/server.rs
//!
//! Builds the ServerContext, starts the background tasks and serves HTTP until
//! Ctrl-C flips the event bus shutdown flag.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use soulseer_core::eventbus::audit_logger::spawn_audit_logger_task;
use soulseer_core::tasks::spawn_balance_sweep_task;
use soulseer_core::Error;

use crate::context::ServerContext;
use crate::api;
use crate::Args;

pub async fn run_server(args: Args) -> Result<(), Error> {
    let ctx = Arc::new(ServerContext::new(&args).await?);

    // 1) Audit log of every domain event
    let audit_handle = spawn_audit_logger_task(&ctx.event_bus, 1024).await;

    // 2) Balance sweep
    let sweep_handle = spawn_balance_sweep_task(
        ctx.metering.clone(),
        ctx.config.sweep_interval,
        ctx.event_bus.shutdown_rx.clone(),
    );

    // 3) Ctrl-C => shutdown
    let eb_clone = ctx.event_bus.clone();
    let _ctrlc_handle = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
        }
        info!("Ctrl-C detected; shutting down event bus...");
        eb_clone.shutdown();
    });

    // 4) HTTP + websocket
    let addr: SocketAddr = args.server_addr.parse().map_err(|e| {
        Error::Validation(format!("Invalid server address '{}': {}", args.server_addr, e))
    })?;
    let listener = TcpListener::bind(addr).await?;
    info!("SoulSeer listening on http://{}", listener.local_addr()?);

    let mut shutdown_rx = ctx.event_bus.shutdown_rx.clone();
    let app = api::router(ctx.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            info!("Shutdown signaled; draining HTTP connections.");
        })
        .await?;

    // 5) Let the background tasks finish their last pass.
    let drain = Duration::from_secs(5);
    if tokio::time::timeout(drain, sweep_handle).await.is_err() {
        error!("Balance sweep did not stop within {:?}", drain);
    }
    if tokio::time::timeout(drain, audit_handle).await.is_err() {
        error!("Audit logger did not drain within {:?}", drain);
    }

    if let Some(db) = &ctx.db {
        db.close().await;
    }
    Ok(())
}
