//! src/realtime/mod.rs
//!
//! Tracks which live connections are subscribed to which session and fans
//! serialized events out to them. Delivery is best-effort and at-most-once:
//! a closed or backed-up connection is skipped, never retried. Clients recover
//! anything they missed from the durable message store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error};
use uuid::Uuid;

use soulseer_common::models::{EndReason, Message, Session};

pub type ConnectionId = Uuid;

/// Frames queued per connection before new ones are dropped.
const OUTBOUND_BUFFER: usize = 256;

/// Server-to-client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A message was persisted. Clients should treat this as a hint and
    /// re-fetch from the message store.
    Message { message: Message },

    #[serde(rename_all = "camelCase")]
    Typing { user_id: Option<Uuid>, is_typing: bool },

    SessionStarted { session: Session },

    #[serde(rename_all = "camelCase")]
    SessionEnded {
        session: Session,
        duration: i64,
        total_cost: Decimal,
        reason: EndReason,
    },

    Error { message: String },
}

/// One live client connection. Cloning shares the same outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user_id: Option<Uuid>,
    tx: mpsc::Sender<Arc<str>>,
}

impl ConnectionHandle {
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a frame for this connection only.
    pub fn send(&self, event: &RealtimeEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(json) => self.try_deliver(Arc::from(json)),
            Err(e) => {
                error!("Failed to serialize realtime event: {:?}", e);
                false
            }
        }
    }

    fn try_deliver(&self, frame: Arc<str>) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Outbound queue full for connection {}; dropping frame", self.id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<Uuid, HashMap<ConnectionId, ConnectionHandle>>,
    memberships: HashMap<ConnectionId, HashSet<Uuid>>,
}

/// Scoped, injectable registry of session subscribers. All mutation happens
/// under one lock, so a broadcast never iterates a set that is being changed.
#[derive(Default)]
pub struct ChannelManager {
    registry: RwLock<Registry>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connection handle and the receiver its transport drains.
    pub fn connect(&self, user_id: Option<Uuid>) -> (ConnectionHandle, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let handle = ConnectionHandle {
            id: Uuid::new_v4(),
            user_id,
            tx,
        };
        (handle, rx)
    }

    /// Subscribe `conn` to `session_id`, creating the set if absent.
    pub async fn join(&self, session_id: Uuid, conn: &ConnectionHandle) {
        let mut reg = self.registry.write().await;
        reg.sessions
            .entry(session_id)
            .or_default()
            .insert(conn.id, conn.clone());
        reg.memberships.entry(conn.id).or_default().insert(session_id);
        debug!("Connection {} joined session {}", conn.id, session_id);
    }

    /// Remove `conn` from every session it joined. Empty sets are discarded;
    /// the remaining subscribers get a "typing stopped" frame so no stale
    /// indicator lingers.
    pub async fn leave(&self, conn: &ConnectionHandle) {
        let typing_cleared = RealtimeEvent::Typing {
            user_id: conn.user_id,
            is_typing: false,
        };
        let frame = match serde_json::to_string(&typing_cleared) {
            Ok(json) => Arc::<str>::from(json),
            Err(e) => {
                error!("Failed to serialize typing frame: {:?}", e);
                return;
            }
        };

        let mut reg = self.registry.write().await;
        let Some(session_ids) = reg.memberships.remove(&conn.id) else {
            return;
        };

        for session_id in session_ids {
            let now_empty = match reg.sessions.get_mut(&session_id) {
                Some(subs) => {
                    subs.remove(&conn.id);
                    for other in subs.values().filter(|c| c.is_open()) {
                        other.try_deliver(frame.clone());
                    }
                    subs.is_empty()
                }
                None => false,
            };
            if now_empty {
                reg.sessions.remove(&session_id);
                debug!("Session {} has no subscribers left; discarded", session_id);
            }
        }
    }

    /// Send `event` to every open subscriber of `session_id`. Returns how many
    /// connections accepted the frame.
    pub async fn broadcast(&self, session_id: Uuid, event: &RealtimeEvent) -> usize {
        self.fan_out(session_id, event, |_| false).await
    }

    /// Like `broadcast`, but skips every connection belonging to `user_id`.
    pub async fn broadcast_excluding_user(
        &self,
        session_id: Uuid,
        event: &RealtimeEvent,
        user_id: Uuid,
    ) -> usize {
        self.fan_out(session_id, event, |c| c.user_id == Some(user_id)).await
    }

    /// Forward a typing indicator from `sender` to the other subscribers of
    /// the same session. Never persisted.
    pub async fn relay_typing(
        &self,
        session_id: Uuid,
        sender: &ConnectionHandle,
        is_typing: bool,
    ) -> usize {
        let event = RealtimeEvent::Typing {
            user_id: sender.user_id,
            is_typing,
        };
        self.fan_out(session_id, &event, |c| c.id == sender.id).await
    }

    pub async fn subscriber_count(&self, session_id: Uuid) -> usize {
        let reg = self.registry.read().await;
        reg.sessions.get(&session_id).map(|s| s.len()).unwrap_or(0)
    }

    pub async fn session_count(&self) -> usize {
        self.registry.read().await.sessions.len()
    }

    async fn fan_out<F>(&self, session_id: Uuid, event: &RealtimeEvent, skip: F) -> usize
    where
        F: Fn(&ConnectionHandle) -> bool,
    {
        let frame: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!("Failed to serialize realtime event: {:?}", e);
                return 0;
            }
        };

        let reg = self.registry.read().await;
        let Some(subs) = reg.sessions.get(&session_id) else {
            return 0;
        };

        subs.values()
            .filter(|c| c.is_open() && !skip(*c))
            .filter(|c| c.try_deliver(frame.clone()))
            .count()
    }
}
