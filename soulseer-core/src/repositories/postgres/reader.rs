// src/repositories/postgres/reader.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use soulseer_common::models::{Reader, ReaderRates};
use soulseer_common::traits::repository_traits::ReaderRepository;
use crate::Error;
use super::is_unique_violation;

const READER_COLUMNS: &str = r#"
    reader_id, user_id, display_name, is_online, is_approved,
    chat_rate, voice_rate, video_rate,
    total_readings, total_earnings, pending_payout,
    payout_account_id, payout_onboarded, created_at
"#;

/// Postgres' default name for the `UNIQUE` on `readers.user_id`.
const ONE_PROFILE_PER_USER: &str = "readers_user_id_key";

pub struct PostgresReaderRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresReaderRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, id: Uuid) -> Result<Option<Reader>, Error> {
        let sql = format!("SELECT {READER_COLUMNS} FROM readers WHERE {clause}");
        let reader = sqlx::query_as::<_, Reader>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reader)
    }

    async fn fetch_all_where(&self, clause: &str) -> Result<Vec<Reader>, Error> {
        let sql = format!(
            "SELECT {READER_COLUMNS} FROM readers WHERE {clause} ORDER BY created_at DESC"
        );
        let readers = sqlx::query_as::<_, Reader>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(readers)
    }
}

#[async_trait]
impl ReaderRepository for PostgresReaderRepository {
    async fn create_reader(&self, reader: &Reader) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO readers (
                reader_id, user_id, display_name, is_online, is_approved,
                chat_rate, voice_rate, video_rate,
                total_readings, total_earnings, pending_payout,
                payout_account_id, payout_onboarded, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
            .bind(reader.reader_id)
            .bind(reader.user_id)
            .bind(&reader.display_name)
            .bind(reader.is_online)
            .bind(reader.is_approved)
            .bind(reader.chat_rate)
            .bind(reader.voice_rate)
            .bind(reader.video_rate)
            .bind(reader.total_readings)
            .bind(reader.total_earnings)
            .bind(reader.pending_payout)
            .bind(&reader.payout_account_id)
            .bind(reader.payout_onboarded)
            .bind(reader.created_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e, ONE_PROFILE_PER_USER) => {
                Err(Error::Validation("User already has a reader profile".into()))
            }
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn get_reader(&self, reader_id: Uuid) -> Result<Option<Reader>, Error> {
        self.fetch_one_where("reader_id = $1", reader_id).await
    }

    async fn get_reader_by_user_id(&self, user_id: Uuid) -> Result<Option<Reader>, Error> {
        self.fetch_one_where("user_id = $1", user_id).await
    }

    async fn set_online(&self, reader_id: Uuid, is_online: bool) -> Result<Option<Reader>, Error> {
        let sql = format!(
            "UPDATE readers SET is_online = $1 WHERE reader_id = $2 RETURNING {READER_COLUMNS}"
        );
        let reader = sqlx::query_as::<_, Reader>(&sql)
            .bind(is_online)
            .bind(reader_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reader)
    }

    async fn update_rates(&self, reader_id: Uuid, rates: &ReaderRates) -> Result<Option<Reader>, Error> {
        let sql = format!(
            r#"
            UPDATE readers
            SET chat_rate = $1, voice_rate = $2, video_rate = $3
            WHERE reader_id = $4
            RETURNING {READER_COLUMNS}
            "#
        );
        let reader = sqlx::query_as::<_, Reader>(&sql)
            .bind(rates.chat_rate)
            .bind(rates.voice_rate)
            .bind(rates.video_rate)
            .bind(reader_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reader)
    }

    async fn approve(&self, reader_id: Uuid) -> Result<Option<Reader>, Error> {
        let sql = format!(
            "UPDATE readers SET is_approved = TRUE WHERE reader_id = $1 RETURNING {READER_COLUMNS}"
        );
        let reader = sqlx::query_as::<_, Reader>(&sql)
            .bind(reader_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reader)
    }

    async fn set_payout_account(&self, reader_id: Uuid, account_id: &str) -> Result<Option<Reader>, Error> {
        let sql = format!(
            "UPDATE readers SET payout_account_id = $1 WHERE reader_id = $2 RETURNING {READER_COLUMNS}"
        );
        let reader = sqlx::query_as::<_, Reader>(&sql)
            .bind(account_id)
            .bind(reader_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reader)
    }

    async fn mark_payout_onboarded(&self, reader_id: Uuid) -> Result<Option<Reader>, Error> {
        let sql = format!(
            "UPDATE readers SET payout_onboarded = TRUE WHERE reader_id = $1 RETURNING {READER_COLUMNS}"
        );
        let reader = sqlx::query_as::<_, Reader>(&sql)
            .bind(reader_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reader)
    }

    async fn list_readers(&self) -> Result<Vec<Reader>, Error> {
        self.fetch_all_where("TRUE").await
    }

    async fn list_approved_readers(&self) -> Result<Vec<Reader>, Error> {
        self.fetch_all_where("is_approved = TRUE").await
    }

    async fn list_online_readers(&self) -> Result<Vec<Reader>, Error> {
        self.fetch_all_where("is_approved = TRUE AND is_online = TRUE").await
    }
}
