//! Database repositories
//!
//! Repository pattern implementations for database access. Every repository
//! is a trait plus a `Sqlx*Repository` working on SQLite and MySQL.

pub mod page;
pub mod session;
pub mod site;
pub mod user;

pub use page::{PageRepository, SqlxPageRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use site::{SiteRepository, SqlxSiteRepository};
pub use user::{SqlxUserRepository, UserRepository};

use anyhow::{Context, Result};
use sqlx::{MySqlPool, Row, SqlitePool};

use crate::config::DatabaseDriver;
use crate::db::query::SqlStatement;
use crate::db::DynDatabasePool;

/// Concrete pool behind a `DynDatabasePool`
pub(crate) enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

pub(crate) fn backend(pool: &DynDatabasePool) -> Result<Backend<'_>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => pool
            .as_sqlite()
            .map(Backend::Sqlite)
            .context("SQLite driver configured but pool is not SQLite"),
        DatabaseDriver::Mysql => pool
            .as_mysql()
            .map(Backend::Mysql)
            .context("MySQL driver configured but pool is not MySQL"),
    }
}

/// Run an INSERT/UPDATE/DELETE and return the generated id, if any
pub(crate) async fn execute_insert(pool: &DynDatabasePool, stmt: &SqlStatement) -> Result<i64> {
    let id = match backend(pool)? {
        Backend::Sqlite(p) => stmt.sqlite_query().execute(p).await?.last_insert_rowid(),
        Backend::Mysql(p) => stmt.mysql_query().execute(p).await?.last_insert_id() as i64,
    };
    Ok(id)
}

/// Run a statement selecting a single `count` column
pub(crate) async fn fetch_count(pool: &DynDatabasePool, stmt: &SqlStatement) -> Result<i64> {
    let count = match backend(pool)? {
        Backend::Sqlite(p) => stmt.sqlite_query().fetch_one(p).await?.get("count"),
        Backend::Mysql(p) => stmt.mysql_query().fetch_one(p).await?.get("count"),
    };
    Ok(count)
}

/// Run an UPDATE/DELETE and return the number of affected rows
pub(crate) async fn execute(pool: &DynDatabasePool, stmt: &SqlStatement) -> Result<u64> {
    let affected = match backend(pool)? {
        Backend::Sqlite(p) => stmt.sqlite_query().execute(p).await?.rows_affected(),
        Backend::Mysql(p) => stmt.mysql_query().execute(p).await?.rows_affected(),
    };
    Ok(affected)
}
