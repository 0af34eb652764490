// src/repositories/postgres/message.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use soulseer_common::models::Message;
use soulseer_common::traits::repository_traits::MessageRepository;
use crate::Error;

pub struct PostgresMessageRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresMessageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn create_message(&self, message: &Message) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO messages (message_id, sender_id, receiver_id, session_id, content, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
            .bind(message.message_id)
            .bind(message.sender_id)
            .bind(message.receiver_id)
            .bind(message.session_id)
            .bind(&message.content)
            .bind(message.is_read)
            .bind(message.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_messages_for_session(&self, session_id: Uuid) -> Result<Vec<Message>, Error> {
        // `seq` breaks ties between messages created in the same instant.
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT message_id, sender_id, receiver_id, session_id, content, is_read, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }

    async fn list_messages_for_user(&self, user_id: Uuid) -> Result<Vec<Message>, Error> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT message_id, sender_id, receiver_id, session_id, content, is_read, created_at
            FROM messages
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }

    async fn mark_messages_read(&self, sender_id: Uuid, receiver_id: Uuid) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE sender_id = $1 AND receiver_id = $2 AND is_read = FALSE
            "#,
        )
            .bind(sender_id)
            .bind(receiver_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
