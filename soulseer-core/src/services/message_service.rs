// File: src/services/message_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use soulseer_common::models::{Conversation, Message};
use crate::clock::Clock;
use crate::eventbus::{EventBus, MarketEvent};
use crate::realtime::{ChannelManager, RealtimeEvent};
use crate::repositories::Stores;
use crate::services::session_for_participant;
use crate::Error;

/// Durable chat between the two participants of a session. Every message is
/// stored before it is relayed, so a lost realtime frame never loses data.
pub struct MessageService {
    stores: Stores,
    channels: Arc<ChannelManager>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    max_len: usize,
}

impl MessageService {
    pub fn new(
        stores: Stores,
        channels: Arc<ChannelManager>,
        event_bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        max_len: usize,
    ) -> Self {
        Self { stores, channels, event_bus, clock, max_len }
    }

    /// 1) Validates content and that `sender_id` takes part in an active session.
    /// 2) Persists the message addressed to the other participant.
    /// 3) Relays it to the session's subscribers, except the sender's own connections.
    pub async fn send_message(
        &self,
        session_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> Result<Message, Error> {
        if content.trim().is_empty() {
            return Err(Error::Validation("Message content is empty".into()));
        }
        if content.chars().count() > self.max_len {
            return Err(Error::Validation(format!(
                "Message exceeds {} characters",
                self.max_len
            )));
        }

        let (session, participants) =
            session_for_participant(&self.stores, sender_id, session_id).await?;
        if !session.is_active() {
            return Err(Error::SessionNotActive(session_id));
        }
        let receiver_id = participants
            .counterpart(sender_id)
            .ok_or_else(|| Error::Forbidden("Not a participant of this session".into()))?;

        let message = Message::new(sender_id, receiver_id, Some(session_id), content, self.clock.now());
        self.stores.messages.create_message(&message).await?;

        let delivered = self
            .channels
            .broadcast_excluding_user(
                session_id,
                &RealtimeEvent::Message { message: message.clone() },
                sender_id,
            )
            .await;
        debug!("Message {} relayed to {} connection(s)", message.message_id, delivered);

        self.event_bus
            .publish(MarketEvent::MessageSent {
                session_id,
                message_id: message.message_id,
                sender_id,
            })
            .await;

        Ok(message)
    }

    /// Oldest first. Participants only.
    pub async fn list_session_messages(&self, actor: Uuid, session_id: Uuid) -> Result<Vec<Message>, Error> {
        session_for_participant(&self.stores, actor, session_id).await?;
        self.stores.messages.list_messages_for_session(session_id).await
    }

    /// The caller's inbox: one entry per counterpart, most recent exchange first.
    /// Counterparts whose account no longer exists are skipped.
    pub async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<Conversation>, Error> {
        // Newest first, so the first message seen per counterpart is the latest.
        let messages = self.stores.messages.list_messages_for_user(user_id).await?;

        let mut order: Vec<Uuid> = Vec::new();
        let mut latest: HashMap<Uuid, (Message, u32)> = HashMap::new();
        for message in messages {
            let other = if message.sender_id == user_id {
                message.receiver_id
            } else {
                message.sender_id
            };
            let unread = u32::from(message.receiver_id == user_id && !message.is_read);
            match latest.get_mut(&other) {
                Some((_, count)) => *count += unread,
                None => {
                    order.push(other);
                    latest.insert(other, (message, unread));
                }
            }
        }

        let mut conversations = Vec::with_capacity(order.len());
        for other in order {
            let Some(other_user) = self.stores.users.get_user(other).await? else {
                continue;
            };
            if let Some((last_message, unread_count)) = latest.remove(&other) {
                conversations.push(Conversation { other_user, last_message, unread_count });
            }
        }
        Ok(conversations)
    }

    /// Marks everything `sender_id` sent to `receiver_id` as read.
    pub async fn mark_read(&self, receiver_id: Uuid, sender_id: Uuid) -> Result<u64, Error> {
        let changed = self.stores.messages.mark_messages_read(sender_id, receiver_id).await?;
        if changed > 0 {
            info!("Marked {} message(s) from {} to {} as read", changed, sender_id, receiver_id);
        }
        Ok(changed)
    }
}
