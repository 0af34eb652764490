// src/tasks/balance_sweep.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::services::MeteringService;
use crate::Error;

/// Spawns a background task that, every `interval`, force-ends active
/// sessions the client can no longer afford. Stops when `shutdown_rx` flips
/// to `true`.
pub fn spawn_balance_sweep_task(
    metering: Arc<MeteringService>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = run_balance_sweep(&metering).await {
                        error!("Balance sweep failed: {:?}", e);
                    }
                }
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Balance sweep shutting down.");
                        break;
                    }
                }
            }
        }
    })
}

/// One pass over every active session. Returns how many were ended.
pub async fn run_balance_sweep(metering: &MeteringService) -> Result<usize, Error> {
    let ended = metering.sweep_balances().await?;
    if ended > 0 {
        info!("Balance sweep ended {} session(s).", ended);
    } else {
        debug!("Balance sweep: nothing to end.");
    }
    Ok(ended)
}
