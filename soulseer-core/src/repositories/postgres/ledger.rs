// src/repositories/postgres/ledger.rs
//
// Every balance or payout change is a single conditional UPDATE (or one
// transaction of them), so concurrent requests never interleave a read and a
// write on the same row.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, Row, Transaction as SqlxTransaction};
use uuid::Uuid;

use soulseer_common::models::{PayoutReservation, Session, Settlement, Transaction};
use soulseer_common::traits::repository_traits::LedgerRepository;
use crate::Error;
use super::is_unique_violation;
use super::session::SESSION_COLUMNS;

const DEPOSIT_REFERENCE: &str = "uq_transactions_deposit_reference";

pub struct PostgresLedgerRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresLedgerRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

async fn insert_transaction(
    tx: &mut SqlxTransaction<'_, Postgres>,
    record: &Transaction,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            transaction_id, user_id, kind, amount, description,
            reference_id, reference_type, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
        .bind(record.transaction_id)
        .bind(record.user_id)
        .bind(record.kind)
        .bind(record.amount)
        .bind(&record.description)
        .bind(&record.reference_id)
        .bind(&record.reference_type)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    async fn credit_balance(&self, user_id: Uuid, amount: Decimal, record: &Transaction) -> Result<Decimal, Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "UPDATE users SET balance = balance + $1 WHERE user_id = $2 RETURNING balance",
        )
            .bind(amount)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(Error::UserNotFound(user_id));
        };
        let balance: Decimal = row.try_get("balance")?;

        insert_transaction(&mut tx, record).await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn debit_balance(&self, user_id: Uuid, amount: Decimal, record: &Transaction) -> Result<Option<Decimal>, Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE users
            SET balance = balance - $1
            WHERE user_id = $2 AND balance >= $1
            RETURNING balance
            "#,
        )
            .bind(amount)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            // Either no such user or not enough funds; tell them apart.
            let exists = sqlx::query("SELECT 1 FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            tx.rollback().await?;
            return if exists { Ok(None) } else { Err(Error::UserNotFound(user_id)) };
        };
        let balance: Decimal = row.try_get("balance")?;

        insert_transaction(&mut tx, record).await?;
        tx.commit().await?;
        Ok(Some(balance))
    }

    async fn credit_deposit(&self, user_id: Uuid, amount: Decimal, record: &Transaction) -> Result<Option<Decimal>, Error> {
        let mut tx = self.pool.begin().await?;

        // 1) Claim the provider reference first. The partial unique index
        //    makes a second confirmation of the same checkout fail here.
        if let Err(e) = insert_transaction(&mut tx, record).await {
            tx.rollback().await?;
            if is_unique_violation(&e, DEPOSIT_REFERENCE) {
                return Ok(None);
            }
            return Err(Error::Database(e));
        }

        // 2) Then move the money.
        let row = sqlx::query(
            "UPDATE users SET balance = balance + $1 WHERE user_id = $2 RETURNING balance",
        )
            .bind(amount)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Err(Error::UserNotFound(user_id));
        };
        let balance: Decimal = row.try_get("balance")?;

        tx.commit().await?;
        Ok(Some(balance))
    }

    async fn accrue_payout(&self, reader_id: Uuid, amount: Decimal) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE readers
            SET pending_payout = pending_payout + $1,
                total_earnings = total_earnings + $1
            WHERE reader_id = $2
            "#,
        )
            .bind(amount)
            .bind(reader_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::ReaderNotFound(reader_id));
        }
        Ok(())
    }

    async fn settle_session(&self, settlement: &Settlement) -> Result<Option<Session>, Error> {
        let c = settlement.charges;
        let mut tx = self.pool.begin().await?;

        // 1) Only an active session may complete. Losing this race means
        //    another caller already settled it.
        let sql = format!(
            r#"
            UPDATE sessions
            SET status = 'completed',
                ended_at = $2,
                duration_minutes = $3,
                total_cost = $4,
                reader_earnings = $5,
                platform_fee = $6,
                end_reason = $7
            WHERE session_id = $1 AND status = 'active'
            RETURNING {SESSION_COLUMNS}
            "#
        );
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(settlement.session_id)
            .bind(settlement.ended_at)
            .bind(c.duration_minutes as i32)
            .bind(c.total_cost)
            .bind(c.reader_earnings)
            .bind(c.platform_fee)
            .bind(settlement.end_reason)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(session) = session else {
            tx.rollback().await?;
            return Ok(None);
        };

        // 2) Debit the client.
        let debited = sqlx::query("UPDATE users SET balance = balance - $1 WHERE user_id = $2")
            .bind(c.total_cost)
            .bind(settlement.client_id)
            .execute(&mut *tx)
            .await?;
        if debited.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(Error::SettlementFailure(format!("client {} missing", settlement.client_id)));
        }

        // 3) Accrue the reader's share.
        let accrued = sqlx::query(
            r#"
            UPDATE readers
            SET pending_payout = pending_payout + $1,
                total_earnings = total_earnings + $1,
                total_readings = total_readings + 1
            WHERE reader_id = $2
            "#,
        )
            .bind(c.reader_earnings)
            .bind(settlement.reader_id)
            .execute(&mut *tx)
            .await?;
        if accrued.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(Error::SettlementFailure(format!("reader {} missing", settlement.reader_id)));
        }

        // 4) Audit records.
        insert_transaction(&mut tx, &settlement.client_charge).await?;
        insert_transaction(&mut tx, &settlement.reader_earning).await?;

        tx.commit().await?;
        Ok(Some(session))
    }

    async fn reserve_pending_payout(&self, reader_id: Uuid, minimum: Decimal) -> Result<PayoutReservation, Error> {
        // The CTE locks the row and reads the pre-update value in one statement.
        let row = sqlx::query(
            r#"
            WITH prev AS (
                SELECT reader_id, pending_payout
                FROM readers
                WHERE reader_id = $1
                FOR UPDATE
            ),
            taken AS (
                UPDATE readers r
                SET pending_payout = 0.00
                FROM prev
                WHERE r.reader_id = prev.reader_id AND prev.pending_payout >= $2
                RETURNING prev.pending_payout AS reserved
            )
            SELECT prev.pending_payout AS pending,
                   (SELECT reserved FROM taken) AS reserved
            FROM prev
            "#,
        )
            .bind(reader_id)
            .bind(minimum)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(Error::ReaderNotFound(reader_id));
        };
        let pending: Decimal = row.try_get("pending")?;
        let reserved: Option<Decimal> = row.try_get("reserved")?;
        Ok(match reserved {
            Some(amount) => PayoutReservation::Reserved(amount),
            None => PayoutReservation::BelowMinimum(pending),
        })
    }

    async fn restore_pending_payout(&self, reader_id: Uuid, amount: Decimal) -> Result<(), Error> {
        let result = sqlx::query(
            "UPDATE readers SET pending_payout = pending_payout + $1 WHERE reader_id = $2",
        )
            .bind(amount)
            .bind(reader_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::ReaderNotFound(reader_id));
        }
        Ok(())
    }

    async fn record_transaction(&self, record: &Transaction) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        insert_transaction(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_transactions_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>, Error> {
        let txs = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT transaction_id, user_id, kind, amount, description,
                   reference_id, reference_type, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(txs)
    }
}
