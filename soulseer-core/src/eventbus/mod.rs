//! src/eventbus/mod.rs
//!
//! In-process bus for marketplace domain events. Each subscriber gets its own
//! bounded MPSC queue, so a slow subscriber applies backpressure instead of
//! silently losing events.
//!
//! This is distinct from the realtime channel manager: the bus carries
//! server-side facts (for auditing and background consumers), not frames for
//! connected clients.

pub mod audit_logger;

use std::sync::Arc;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch, Mutex};
use uuid::Uuid;

use soulseer_common::models::{EndReason, SessionType};

#[derive(Debug, Clone)]
pub enum MarketEvent {
    SessionStarted {
        session_id: Uuid,
        client_id: Uuid,
        reader_id: Uuid,
        session_type: SessionType,
        rate_per_minute: Decimal,
        at: DateTime<Utc>,
    },

    SessionEnded {
        session_id: Uuid,
        reason: EndReason,
        duration_minutes: i64,
        total_cost: Decimal,
        reader_earnings: Decimal,
        platform_fee: Decimal,
        at: DateTime<Utc>,
    },

    /// The balance sweep ended a session the client could no longer afford.
    SessionForceEnded {
        session_id: Uuid,
        client_id: Uuid,
        projected_cost: Decimal,
        balance: Decimal,
    },

    MessageSent {
        session_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
    },

    DepositConfirmed {
        user_id: Uuid,
        amount: Decimal,
        provider_session_id: String,
    },

    PayoutCompleted {
        reader_id: Uuid,
        amount: Decimal,
        transfer_id: String,
    },
}

impl MarketEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            MarketEvent::SessionStarted { .. } => "session.started",
            MarketEvent::SessionEnded { .. } => "session.ended",
            MarketEvent::SessionForceEnded { .. } => "session.force_ended",
            MarketEvent::MessageSent { .. } => "message.sent",
            MarketEvent::DepositConfirmed { .. } => "deposit.confirmed",
            MarketEvent::PayoutCompleted { .. } => "payout.completed",
        }
    }
}

/// Each subscriber gets its own `mpsc::Sender<MarketEvent>`.
///
/// - If the subscriber's channel buffer fills, `publish` will await
///   until there's space (backpressure).
/// - If the subscriber has dropped the `Receiver`, sending fails and that
///   subscriber is skipped.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<MarketEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

const DEFAULT_BUFFER_SIZE: usize = 1024;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<MarketEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an event to all live subscribers. Closed subscribers are pruned.
    pub async fn publish(&self, event: MarketEvent) {
        let senders = {
            let mut subs = self.subscribers.lock().await;
            subs.retain(|s| !s.is_closed());
            subs.clone()
        };
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    fn message_sent(message_id: Uuid) -> MarketEvent {
        MarketEvent::MessageSent {
            session_id: Uuid::nil(),
            message_id,
            sender_id: Uuid::nil(),
        }
    }

    fn message_id_of(event: Option<MarketEvent>) -> Option<Uuid> {
        match event {
            Some(MarketEvent::MessageSent { message_id, .. }) => Some(message_id),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();

        let mut rx1 = bus.subscribe(Some(5)).await;
        let mut rx2 = bus.subscribe(Some(5)).await;

        bus.publish(message_sent(Uuid::new_v4())).await;

        let evt1 = rx1.recv().await.expect("rx1 should get event");
        let evt2 = rx2.recv().await.expect("rx2 should get event");
        assert_eq!(evt1.event_type(), "message.sent");
        assert_eq!(evt2.event_type(), "message.sent");
    }

    #[tokio::test]
    async fn test_backpressure_blocking() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1)).await;
        let (first_id, second_id) = (Uuid::new_v4(), Uuid::new_v4());

        // Fill the queue.
        bus.publish(message_sent(first_id)).await;

        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            let first = message_id_of(rx.recv().await);
            let second = message_id_of(rx.recv().await);
            (first, second)
        });

        // Waits until the reader makes room.
        let second_publish = bus.publish(message_sent(second_id));
        let result = timeout(Duration::from_millis(500), second_publish).await;
        assert!(result.is_ok(), "publish should eventually unblock");

        let (first, second) = handle.await.unwrap();
        assert_eq!(first, Some(first_id));
        assert_eq!(second, Some(second_id));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_block() {
        let bus = EventBus::new();
        let rx_dropped = bus.subscribe(Some(1)).await;
        let mut rx_live = bus.subscribe(Some(4)).await;
        drop(rx_dropped);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let publish = async {
            bus.publish(message_sent(a)).await;
            bus.publish(message_sent(b)).await;
        };
        timeout(Duration::from_millis(200), publish)
            .await
            .expect("publish must not wait on a dropped subscriber");

        assert_eq!(message_id_of(rx_live.recv().await), Some(a));
        assert_eq!(message_id_of(rx_live.recv().await), Some(b));
    }
}
