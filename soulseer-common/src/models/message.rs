use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::User;

/// A chat message. Immutable once created apart from `is_read`, which the
/// receiving participant flips.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub session_id: Option<Uuid>,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        sender_id: Uuid,
        receiver_id: Uuid,
        session_id: Option<Uuid>,
        content: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            session_id,
            content: content.to_string(),
            is_read: false,
            created_at: now,
        }
    }
}

/// One inbox row: the latest message exchanged with `other_user` and how many
/// of their messages are still unread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub other_user: User,
    pub last_message: Message,
    pub unread_count: u32,
}
