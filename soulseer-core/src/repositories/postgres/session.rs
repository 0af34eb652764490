// src/repositories/postgres/session.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use soulseer_common::models::Session;
use soulseer_common::traits::repository_traits::SessionRepository;
use crate::Error;
use super::is_unique_violation;

pub(crate) const SESSION_COLUMNS: &str = r#"
    session_id, client_id, reader_id, session_type, status, rate_per_minute,
    started_at, ended_at, duration_minutes, total_cost, reader_earnings,
    platform_fee, end_reason, created_at
"#;

const ONE_ACTIVE_PER_CLIENT: &str = "uq_sessions_one_active_per_client";

pub struct PostgresSessionRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresSessionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn create_session(&self, session: &Session) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id, client_id, reader_id, session_type, status,
                rate_per_minute, started_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
            .bind(session.session_id)
            .bind(session.client_id)
            .bind(session.reader_id)
            .bind(session.session_type)
            .bind(session.status)
            .bind(session.rate_per_minute)
            .bind(session.started_at)
            .bind(session.created_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e, ONE_ACTIVE_PER_CLIENT) => Err(Error::SessionAlreadyActive),
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, Error> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = $1");
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn list_sessions_for_client(&self, client_id: Uuid) -> Result<Vec<Session>, Error> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE client_id = $1 ORDER BY created_at DESC"
        );
        let sessions = sqlx::query_as::<_, Session>(&sql)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    async fn list_sessions_for_reader(&self, reader_id: Uuid) -> Result<Vec<Session>, Error> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE reader_id = $1 ORDER BY created_at DESC"
        );
        let sessions = sqlx::query_as::<_, Session>(&sql)
            .bind(reader_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    async fn list_active_sessions(&self) -> Result<Vec<Session>, Error> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = 'active' ORDER BY started_at ASC"
        );
        let sessions = sqlx::query_as::<_, Session>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, Error> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC");
        let sessions = sqlx::query_as::<_, Session>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }
}
