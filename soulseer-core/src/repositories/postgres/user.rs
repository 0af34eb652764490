// src/repositories/postgres/user.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use soulseer_common::models::{User, UserRole};
use soulseer_common::traits::repository_traits::UserRepository;
use crate::Error;

const USER_COLUMNS: &str =
    "user_id, username, email, role, full_name, balance, created_at";

pub struct PostgresUserRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, user: &User) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, email, role, full_name, balance, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
            .bind(user.user_id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.role)
            .bind(&user.full_name)
            .bind(user.balance)
            .bind(user.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<User>, Error> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY created_at DESC"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(role)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn set_role(&self, user_id: Uuid, role: UserRole) -> Result<(), Error> {
        let result = sqlx::query("UPDATE users SET role = $1 WHERE user_id = $2")
            .bind(role)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound(user_id));
        }
        Ok(())
    }
}
