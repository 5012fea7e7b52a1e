//! Session repository
//!
//! Sessions are issued by the login flow of the surrounding application;
//! here they are only stored, looked up and removed once expired.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

use super::{backend, execute, execute_insert, Backend};
use crate::db::query::{SqlStatement, SqlValue};
use crate::db::DynDatabasePool;
use crate::models::Session;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        let stmt = SqlStatement::new(
            "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(SqlValue::Text(session.id.clone()))
        .bind(SqlValue::Int(session.user_id))
        .bind(SqlValue::Time(session.expires_at))
        .bind(SqlValue::Time(session.created_at));
        execute_insert(&self.pool, &stmt)
            .await
            .context("Failed to create session")?;
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let stmt = SqlStatement::new(
            "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?",
        )
        .bind(SqlValue::Text(id.to_string()));

        let session = match backend(&self.pool)? {
            Backend::Sqlite(p) => stmt
                .sqlite_query()
                .fetch_optional(p)
                .await
                .context("Failed to get session")?
                .map(|r| Session {
                    id: r.get("id"),
                    user_id: r.get("user_id"),
                    expires_at: r.get("expires_at"),
                    created_at: r.get("created_at"),
                }),
            Backend::Mysql(p) => stmt
                .mysql_query()
                .fetch_optional(p)
                .await
                .context("Failed to get session")?
                .map(|r| Session {
                    id: r.get("id"),
                    user_id: r.get("user_id"),
                    expires_at: r.get("expires_at"),
                    created_at: r.get("created_at"),
                }),
        };
        Ok(session)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let stmt = SqlStatement::new("DELETE FROM sessions WHERE id = ?")
            .bind(SqlValue::Text(id.to_string()));
        execute(&self.pool, &stmt)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::{Duration, Utc};

    async fn setup() -> (SqlxSessionRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("author", "author@example.com", UserRole::Author))
            .await
            .expect("Failed to create user");
        (SqlxSessionRepository::new(pool), user.id)
    }

    fn session(user_id: i64, expires_in_days: i64) -> Session {
        let now = Utc::now();
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(expires_in_days),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_get_delete_session() {
        let (repo, user_id) = setup().await;
        let created = repo.create(&session(user_id, 7)).await.unwrap();

        let found = repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found.user_id, user_id);
        assert!(!found.is_expired());

        repo.delete(&created.id).await.unwrap();
        assert!(repo.get_by_id(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_reports_expired() {
        let (repo, user_id) = setup().await;
        let created = repo.create(&session(user_id, -1)).await.unwrap();
        let found = repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert!(found.is_expired());
    }
}
