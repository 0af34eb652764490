//! src/eventbus/audit_logger.rs
//!
//! Spawns a task that subscribes to the EventBus and writes every domain event
//! to the tracing log. Drains the queue on shutdown.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::eventbus::{EventBus, MarketEvent};

/// Returns a `JoinHandle<()>` so shutdown logic (and tests) can wait for the
/// final drain.
pub async fn spawn_audit_logger_task(event_bus: &EventBus, buffer_size: usize) -> JoinHandle<()> {
    let rx = event_bus.subscribe(Some(buffer_size)).await;
    let shutdown_rx = event_bus.shutdown_rx.clone();

    tokio::spawn(run_audit_logger(rx, shutdown_rx))
}

async fn run_audit_logger(
    mut rx: mpsc::Receiver<MarketEvent>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    info!("Audit logger task started.");

    loop {
        tokio::select! {
            biased;
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(event) => log_event(&event),
                    None => {
                        info!("Audit logger channel closed => break from loop.");
                        break;
                    }
                }
            },
            Ok(_) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Audit logger shutting down => break from loop.");
                    break;
                }
            }
        }
    }

    while let Ok(event) = rx.try_recv() {
        log_event(&event);
    }
    info!("Audit logger task exited completely.");
}

fn log_event(event: &MarketEvent) {
    let event_type = event.event_type();
    match event {
        MarketEvent::SessionStarted { session_id, client_id, reader_id, session_type, rate_per_minute, .. } => {
            info!(event_type, %session_id, %client_id, %reader_id, %session_type, %rate_per_minute, "session started");
        }
        MarketEvent::SessionEnded { session_id, reason, duration_minutes, total_cost, reader_earnings, platform_fee, .. } => {
            info!(
                event_type, %session_id, ?reason, duration_minutes,
                %total_cost, %reader_earnings, %platform_fee,
                "session settled"
            );
        }
        MarketEvent::SessionForceEnded { session_id, client_id, projected_cost, balance } => {
            warn!(event_type, %session_id, %client_id, %projected_cost, %balance, "session force-ended");
        }
        MarketEvent::MessageSent { session_id, message_id, sender_id } => {
            info!(event_type, %session_id, %message_id, %sender_id, "message sent");
        }
        MarketEvent::DepositConfirmed { user_id, amount, provider_session_id } => {
            info!(event_type, %user_id, %amount, provider_session_id = provider_session_id.as_str(), "deposit credited");
        }
        MarketEvent::PayoutCompleted { reader_id, amount, transfer_id } => {
            info!(event_type, %reader_id, %amount, transfer_id = transfer_id.as_str(), "payout transferred");
        }
    }
}
