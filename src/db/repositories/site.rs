//! Site repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

use super::{backend, execute_insert, Backend};
use crate::db::query::{SqlStatement, SqlValue};
use crate::db::DynDatabasePool;
use crate::models::Site;

#[async_trait]
pub trait SiteRepository: Send + Sync {
    async fn create(&self, domain: &str, name: &str) -> Result<Site>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Site>>;
    async fn get_by_domain(&self, domain: &str) -> Result<Option<Site>>;
}

pub struct SqlxSiteRepository {
    pool: DynDatabasePool,
}

impl SqlxSiteRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SiteRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_optional(&self, stmt: SqlStatement) -> Result<Option<Site>> {
        let site = match backend(&self.pool)? {
            Backend::Sqlite(p) => stmt
                .sqlite_query()
                .fetch_optional(p)
                .await
                .context("Failed to get site")?
                .map(|r| Site {
                    id: r.get("id"),
                    domain: r.get("domain"),
                    name: r.get("name"),
                }),
            Backend::Mysql(p) => stmt
                .mysql_query()
                .fetch_optional(p)
                .await
                .context("Failed to get site")?
                .map(|r| Site {
                    id: r.get("id"),
                    domain: r.get("domain"),
                    name: r.get("name"),
                }),
        };
        Ok(site)
    }
}

#[async_trait]
impl SiteRepository for SqlxSiteRepository {
    async fn create(&self, domain: &str, name: &str) -> Result<Site> {
        let stmt = SqlStatement::new("INSERT INTO sites (domain, name) VALUES (?, ?)")
            .bind(SqlValue::Text(domain.to_string()))
            .bind(SqlValue::Text(name.to_string()));
        let id = execute_insert(&self.pool, &stmt)
            .await
            .context("Failed to create site")?;
        Ok(Site {
            id,
            domain: domain.to_string(),
            name: name.to_string(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Site>> {
        self.fetch_optional(
            SqlStatement::new("SELECT id, domain, name FROM sites WHERE id = ?")
                .bind(SqlValue::Int(id)),
        )
        .await
    }

    async fn get_by_domain(&self, domain: &str) -> Result<Option<Site>> {
        self.fetch_optional(
            SqlStatement::new("SELECT id, domain, name FROM sites WHERE domain = ?")
                .bind(SqlValue::Text(domain.to_lowercase())),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxSiteRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxSiteRepository::new(pool)
    }

    #[tokio::test]
    async fn test_default_site_exists() {
        let repo = setup_test_repo().await;
        let site = repo.get_by_id(1).await.unwrap().expect("Seeded site");
        assert_eq!(site.domain, "example.com");
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_domain() {
        let repo = setup_test_repo().await;
        let created = repo.create("docs.example.org", "Docs").await.unwrap();
        assert!(created.id > 1);

        let found = repo.get_by_domain("Docs.Example.org").await.unwrap();
        assert_eq!(found, Some(created));
        assert!(repo.get_by_domain("missing.test").await.unwrap().is_none());
    }
}
