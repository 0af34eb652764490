use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Client,
    Reader,
    Admin,
}

/// A marketplace account. `balance` is only debited by settlement or purchases
/// and only credited by deposits.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: &str, email: &str, role: UserRole) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            role,
            full_name: None,
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
