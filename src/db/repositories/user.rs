//! User repository
//!
//! Accounts are provisioned elsewhere; page resolution only needs to look
//! them up by id (from a session) or by name.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

use super::{backend, execute_insert, Backend};
use crate::db::query::{SqlStatement, SqlValue};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};

const USER_COLUMNS: &str = "id, username, email, role, created_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_optional(&self, stmt: SqlStatement) -> Result<Option<User>> {
        match backend(&self.pool)? {
            Backend::Sqlite(p) => stmt
                .sqlite_query()
                .fetch_optional(p)
                .await
                .context("Failed to get user")?
                .map(|r| {
                    row_to_user(
                        r.get("id"),
                        r.get("username"),
                        r.get("email"),
                        r.get("role"),
                        r.get("created_at"),
                    )
                })
                .transpose(),
            Backend::Mysql(p) => stmt
                .mysql_query()
                .fetch_optional(p)
                .await
                .context("Failed to get user")?
                .map(|r| {
                    row_to_user(
                        r.get("id"),
                        r.get("username"),
                        r.get("email"),
                        r.get("role"),
                        r.get("created_at"),
                    )
                })
                .transpose(),
        }
    }
}

fn row_to_user(
    id: i64,
    username: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
) -> Result<User> {
    Ok(User {
        id,
        username,
        email,
        role: role.parse::<UserRole>()?,
        created_at,
    })
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let stmt = SqlStatement::new(
            "INSERT INTO users (username, email, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(SqlValue::Text(user.username.clone()))
        .bind(SqlValue::Text(user.email.clone()))
        .bind(SqlValue::Text(user.role.to_string()))
        .bind(SqlValue::Time(user.created_at));

        let id = execute_insert(&self.pool, &stmt)
            .await
            .context("Failed to create user")?;
        Ok(User {
            id,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        self.fetch_optional(
            SqlStatement::new(format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                .bind(SqlValue::Int(id)),
        )
        .await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_optional(
            SqlStatement::new(format!(
                "SELECT {} FROM users WHERE username = ?",
                USER_COLUMNS
            ))
            .bind(SqlValue::Text(username.to_string())),
        )
        .await
    }
}
