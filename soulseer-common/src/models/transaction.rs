use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    SessionCharge,
    SessionEarning,
    Deposit,
    Payout,
    Purchase,
}

/// Append-only audit record of a money movement. Negative `amount` is a debit.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        kind: TransactionKind,
        amount: Decimal,
        description: &str,
        reference_id: &str,
        reference_type: &str,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            user_id,
            kind,
            amount,
            description: Some(description.to_string()),
            reference_id: Some(reference_id.to_string()),
            reference_type: Some(reference_type.to_string()),
            created_at: Utc::now(),
        }
    }
}
