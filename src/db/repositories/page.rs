//! Page repository
//!
//! Reads and writes the page tree: nodes, page variants and their titles.
//! Lookups take the composed filters from `db::query`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{backend, execute, execute_insert, fetch_count, Backend};
use crate::db::query::{
    AncestorQuery, NodeQuery, PageQuery, SqlStatement, SqlValue, TitleQuery, NODE_COLUMNS,
    PAGE_COLUMNS,
};
use crate::db::DynDatabasePool;
use crate::models::{NewPage, NewTitle, Page, PageNode, Title, MAX_CHILDREN};

#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Append a node as the last child of `parent`, or as a root of the site
    async fn create_node(&self, site_id: i64, parent: Option<&PageNode>) -> Result<PageNode>;
    async fn get_node(&self, id: i64) -> Result<Option<PageNode>>;
    async fn find_nodes(&self, query: &NodeQuery) -> Result<Vec<PageNode>>;

    async fn create_page(&self, page: &NewPage) -> Result<Page>;
    async fn get_page(&self, id: i64) -> Result<Option<Page>>;
    /// Point a draft at its public copy
    async fn link_public(&self, draft_id: i64, public_id: i64) -> Result<()>;
    async fn find_pages(&self, query: &PageQuery) -> Result<Vec<Page>>;
    async fn exists(&self, query: &PageQuery) -> Result<bool>;

    async fn create_title(&self, page: &Page, title: &NewTitle) -> Result<Title>;
    async fn titles_for_page(&self, page_id: i64) -> Result<Vec<Title>>;
    /// Titles matching the query, each with its page, in query order
    async fn find_titles(&self, query: &TitleQuery) -> Result<Vec<(Title, Page)>>;

    async fn count_ancestors(&self, query: &AncestorQuery) -> Result<i64>;
}

pub struct SqlxPageRepository {
    pool: DynDatabasePool,
}

impl SqlxPageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PageRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_nodes(&self, stmt: &SqlStatement) -> Result<Vec<PageNode>> {
        let nodes = match backend(&self.pool)? {
            Backend::Sqlite(p) => stmt
                .sqlite_query()
                .fetch_all(p)
                .await
                .context("Failed to load page nodes")?
                .iter()
                .map(row_to_node_sqlite)
                .collect(),
            Backend::Mysql(p) => stmt
                .mysql_query()
                .fetch_all(p)
                .await
                .context("Failed to load page nodes")?
                .iter()
                .map(row_to_node_mysql)
                .collect(),
        };
        Ok(nodes)
    }

    async fn fetch_pages(&self, stmt: &SqlStatement) -> Result<Vec<Page>> {
        let pages = match backend(&self.pool)? {
            Backend::Sqlite(p) => stmt
                .sqlite_query()
                .fetch_all(p)
                .await
                .context("Failed to load pages")?
                .iter()
                .map(row_to_page_sqlite)
                .collect(),
            Backend::Mysql(p) => stmt
                .mysql_query()
                .fetch_all(p)
                .await
                .context("Failed to load pages")?
                .iter()
                .map(row_to_page_mysql)
                .collect(),
        };
        Ok(pages)
    }

    async fn fetch_titles(&self, stmt: &SqlStatement) -> Result<Vec<Title>> {
        let titles = match backend(&self.pool)? {
            Backend::Sqlite(p) => stmt
                .sqlite_query()
                .fetch_all(p)
                .await
                .context("Failed to load titles")?
                .iter()
                .map(row_to_title_sqlite)
                .collect(),
            Backend::Mysql(p) => stmt
                .mysql_query()
                .fetch_all(p)
                .await
                .context("Failed to load titles")?
                .iter()
                .map(row_to_title_mysql)
                .collect(),
        };
        Ok(titles)
    }

    /// Highest child position currently used below `parent`
    async fn last_child_position(&self, site_id: i64, parent: Option<&PageNode>) -> Result<u32> {
        let stmt = match parent {
            Some(parent) => SqlStatement::new(format!(
                "SELECT {} FROM page_nodes n WHERE n.site_id = ? AND n.parent_id = ?",
                NODE_COLUMNS
            ))
            .bind(SqlValue::Int(site_id))
            .bind(SqlValue::Int(parent.id)),
            None => SqlStatement::new(format!(
                "SELECT {} FROM page_nodes n WHERE n.site_id = ? AND n.parent_id IS NULL",
                NODE_COLUMNS
            ))
            .bind(SqlValue::Int(site_id)),
        };

        let siblings = self.fetch_nodes(&stmt).await?;
        Ok(siblings
            .iter()
            .filter_map(|node| PageNode::last_step_position(&node.path))
            .max()
            .unwrap_or(0))
    }
}

#[async_trait]
impl PageRepository for SqlxPageRepository {
    async fn create_node(&self, site_id: i64, parent: Option<&PageNode>) -> Result<PageNode> {
        if let Some(parent) = parent {
            anyhow::ensure!(
                parent.site_id == site_id,
                "Parent node {} belongs to site {}, not {}",
                parent.id,
                parent.site_id,
                site_id
            );
        }

        let position = self.last_child_position(site_id, parent).await? + 1;
        let step = PageNode::path_step(position).with_context(|| {
            format!(
                "Node already has {} children, the most one level can hold",
                MAX_CHILDREN
            )
        })?;
        let (path, depth) = match parent {
            Some(parent) => (format!("{}{}", parent.path, step), parent.depth + 1),
            None => (step, 1),
        };
        let now = Utc::now();

        let (parent_sql, parent_bind) = nullable(parent.map(|p| SqlValue::Int(p.id)));
        let mut stmt = SqlStatement::new(format!(
            "INSERT INTO page_nodes (site_id, parent_id, path, depth, created_at) VALUES (?, {}, ?, ?, ?)",
            parent_sql
        ))
        .bind(SqlValue::Int(site_id));
        stmt.binds.extend(parent_bind);
        let stmt = stmt
            .bind(SqlValue::Text(path.clone()))
            .bind(SqlValue::Int(i64::from(depth)))
            .bind(SqlValue::Time(now));

        let id = execute_insert(&self.pool, &stmt)
            .await
            .context("Failed to create page node")?;

        Ok(PageNode {
            id,
            site_id,
            parent_id: parent.map(|p| p.id),
            path,
            depth,
            created_at: now,
        })
    }

    async fn get_node(&self, id: i64) -> Result<Option<PageNode>> {
        let stmt = SqlStatement::new(format!(
            "SELECT {} FROM page_nodes n WHERE n.id = ?",
            NODE_COLUMNS
        ))
        .bind(SqlValue::Int(id));
        Ok(self.fetch_nodes(&stmt).await?.into_iter().next())
    }

    async fn find_nodes(&self, query: &NodeQuery) -> Result<Vec<PageNode>> {
        self.fetch_nodes(&query.to_select()).await
    }

    async fn create_page(&self, page: &NewPage) -> Result<Page> {
        let now = Utc::now();
        let (public_sql, public) = nullable(page.publisher_public_id.map(SqlValue::Int));
        let (start_sql, start) = nullable(page.publication_date.map(SqlValue::Time));
        let (end_sql, end) = nullable(page.publication_end_date.map(SqlValue::Time));

        let mut stmt = SqlStatement::new(format!(
            "INSERT INTO pages (node_id, publisher_is_draft, publisher_public_id, is_home, template, \
             publication_date, publication_end_date, created_by, changed_by, created_at, updated_at) \
             VALUES (?, ?, {}, ?, ?, {}, {}, ?, ?, ?, ?)",
            public_sql, start_sql, end_sql
        ))
        .bind(SqlValue::Int(page.node_id))
        .bind(SqlValue::Bool(page.publisher_is_draft));
        stmt.binds.extend(public);
        stmt = stmt
            .bind(SqlValue::Bool(page.is_home))
            .bind(SqlValue::Text(page.template.clone()));
        stmt.binds.extend(start);
        stmt.binds.extend(end);
        let stmt = stmt
            .bind(SqlValue::Text(page.created_by.clone()))
            .bind(SqlValue::Text(page.created_by.clone()))
            .bind(SqlValue::Time(now))
            .bind(SqlValue::Time(now));

        let id = execute_insert(&self.pool, &stmt)
            .await
            .context("Failed to create page")?;

        Ok(Page {
            id,
            node_id: page.node_id,
            publisher_is_draft: page.publisher_is_draft,
            publisher_public_id: page.publisher_public_id,
            is_home: page.is_home,
            template: page.template.clone(),
            publication_date: page.publication_date,
            publication_end_date: page.publication_end_date,
            created_by: page.created_by.clone(),
            changed_by: page.created_by.clone(),
            created_at: now,
            updated_at: now,
            node: None,
            title_cache: BTreeMap::new(),
        })
    }

    async fn get_page(&self, id: i64) -> Result<Option<Page>> {
        let stmt = SqlStatement::new(format!("SELECT {} FROM pages p WHERE p.id = ?", PAGE_COLUMNS))
            .bind(SqlValue::Int(id));
        Ok(self.fetch_pages(&stmt).await?.into_iter().next())
    }

    async fn link_public(&self, draft_id: i64, public_id: i64) -> Result<()> {
        let stmt = SqlStatement::new("UPDATE pages SET publisher_public_id = ? WHERE id = ?")
            .bind(SqlValue::Int(public_id))
            .bind(SqlValue::Int(draft_id));
        let affected = execute(&self.pool, &stmt)
            .await
            .context("Failed to link public page")?;
        anyhow::ensure!(affected == 1, "Draft page {} not found", draft_id);
        Ok(())
    }

    async fn find_pages(&self, query: &PageQuery) -> Result<Vec<Page>> {
        self.fetch_pages(&query.to_select()).await
    }

    async fn exists(&self, query: &PageQuery) -> Result<bool> {
        Ok(fetch_count(&self.pool, &query.to_count())
            .await
            .context("Failed to count pages")?
            > 0)
    }

    async fn create_title(&self, page: &Page, title: &NewTitle) -> Result<Title> {
        let stmt = SqlStatement::new(
            "INSERT INTO titles (page_id, language, title, slug, path, published, publisher_is_draft) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(SqlValue::Int(page.id))
        .bind(SqlValue::Text(title.language.clone()))
        .bind(SqlValue::Text(title.title.clone()))
        .bind(SqlValue::Text(title.slug.clone()))
        .bind(SqlValue::Text(title.path.clone()))
        .bind(SqlValue::Bool(title.published))
        .bind(SqlValue::Bool(page.publisher_is_draft));

        let id = execute_insert(&self.pool, &stmt)
            .await
            .with_context(|| format!("Failed to create title for page {}", page.id))?;

        Ok(Title {
            id,
            page_id: page.id,
            language: title.language.clone(),
            title: title.title.clone(),
            slug: title.slug.clone(),
            path: title.path.clone(),
            published: title.published,
            publisher_is_draft: page.publisher_is_draft,
        })
    }

    async fn titles_for_page(&self, page_id: i64) -> Result<Vec<Title>> {
        let stmt = SqlStatement::new(
            "SELECT t.id AS title_id, t.page_id AS title_page_id, t.language AS title_language, \
             t.title AS title_title, t.slug AS title_slug, t.path AS title_path, \
             t.published AS title_published, t.publisher_is_draft AS title_publisher_is_draft \
             FROM titles t WHERE t.page_id = ? ORDER BY t.language",
        )
        .bind(SqlValue::Int(page_id));
        self.fetch_titles(&stmt).await
    }

    async fn find_titles(&self, query: &TitleQuery) -> Result<Vec<(Title, Page)>> {
        let stmt = query.to_select();
        let pairs = match backend(&self.pool)? {
            Backend::Sqlite(p) => stmt
                .sqlite_query()
                .fetch_all(p)
                .await
                .context("Failed to load titles")?
                .iter()
                .map(|row| (row_to_title_sqlite(row), row_to_page_sqlite(row)))
                .collect(),
            Backend::Mysql(p) => stmt
                .mysql_query()
                .fetch_all(p)
                .await
                .context("Failed to load titles")?
                .iter()
                .map(|row| (row_to_title_mysql(row), row_to_page_mysql(row)))
                .collect(),
        };
        Ok(pairs)
    }

    async fn count_ancestors(&self, query: &AncestorQuery) -> Result<i64> {
        if query.paths().is_empty() {
            return Ok(0);
        }
        fetch_count(&self.pool, &query.to_count())
            .await
            .context("Failed to check ancestor nodes")
    }
}

/// Placeholder for an optional value; `SqlValue` has no null, so NULL is inlined
fn nullable(value: Option<SqlValue>) -> (&'static str, Option<SqlValue>) {
    match value {
        Some(value) => ("?", Some(value)),
        None => ("NULL", None),
    }
}

// SQLite row mapping
fn row_to_node_sqlite(row: &SqliteRow) -> PageNode {
    PageNode {
        id: row.get("id"),
        site_id: row.get("site_id"),
        parent_id: row.get("parent_id"),
        path: row.get("path"),
        depth: row.get("depth"),
        created_at: row.get("created_at"),
    }
}

fn row_to_page_sqlite(row: &SqliteRow) -> Page {
    Page {
        id: row.get("id"),
        node_id: row.get("node_id"),
        publisher_is_draft: row.get("publisher_is_draft"),
        publisher_public_id: row.get("publisher_public_id"),
        is_home: row.get("is_home"),
        template: row.get("template"),
        publication_date: row.get("publication_date"),
        publication_end_date: row.get("publication_end_date"),
        created_by: row.get("created_by"),
        changed_by: row.get("changed_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        node: None,
        title_cache: BTreeMap::new(),
    }
}

fn row_to_title_sqlite(row: &SqliteRow) -> Title {
    Title {
        id: row.get("title_id"),
        page_id: row.get("title_page_id"),
        language: row.get("title_language"),
        title: row.get("title_title"),
        slug: row.get("title_slug"),
        path: row.get("title_path"),
        published: row.get("title_published"),
        publisher_is_draft: row.get("title_publisher_is_draft"),
    }
}

// MySQL row mapping
fn row_to_node_mysql(row: &MySqlRow) -> PageNode {
    PageNode {
        id: row.get("id"),
        site_id: row.get("site_id"),
        parent_id: row.get("parent_id"),
        path: row.get("path"),
        depth: row.get("depth"),
        created_at: row.get("created_at"),
    }
}

fn row_to_page_mysql(row: &MySqlRow) -> Page {
    Page {
        id: row.get("id"),
        node_id: row.get("node_id"),
        publisher_is_draft: row.get("publisher_is_draft"),
        publisher_public_id: row.get("publisher_public_id"),
        is_home: row.get("is_home"),
        template: row.get("template"),
        publication_date: row.get("publication_date"),
        publication_end_date: row.get("publication_end_date"),
        created_by: row.get("created_by"),
        changed_by: row.get("changed_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        node: None,
        title_cache: BTreeMap::new(),
    }
}

fn row_to_title_mysql(row: &MySqlRow) -> Title {
    Title {
        id: row.get("title_id"),
        page_id: row.get("title_page_id"),
        language: row.get("title_language"),
        title: row.get("title_title"),
        slug: row.get("title_slug"),
        path: row.get("title_path"),
        published: row.get("title_published"),
        publisher_is_draft: row.get("title_publisher_is_draft"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::TitleState;
    use crate::db::{create_test_pool, migrations};
    use crate::models::PageVariant;
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxPageRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxPageRepository::new(pool)
    }

    /// Draft + public pair on a fresh node, each with one `en` title at `path`
    async fn published_pair(
        repo: &SqlxPageRepository,
        parent: Option<&PageNode>,
        path: &str,
    ) -> (PageNode, Page, Page) {
        let node = repo.create_node(1, parent).await.unwrap();
        let draft = repo
            .create_page(&NewPage::draft(node.id, "page.html", "admin"))
            .await
            .unwrap();
        let public = repo.create_page(&NewPage::public_of(&draft)).await.unwrap();
        repo.link_public(draft.id, public.id).await.unwrap();
        repo.create_title(&draft, &NewTitle::new("en", path, path))
            .await
            .unwrap();
        repo.create_title(&public, &NewTitle::new("en", path, path).published())
            .await
            .unwrap();
        (node, draft, public)
    }

    #[tokio::test]
    async fn test_create_nodes_builds_materialized_paths() {
        let repo = setup_test_repo().await;
        let first = repo.create_node(1, None).await.unwrap();
        let second = repo.create_node(1, None).await.unwrap();
        let child = repo.create_node(1, Some(&first)).await.unwrap();

        assert_eq!(first.path, "0001");
        assert_eq!(second.path, "0002");
        assert_eq!(child.path, "00010001");
        assert_eq!(child.depth, 2);
        assert_eq!(child.parent_id, Some(first.id));
        assert_eq!(repo.get_node(child.id).await.unwrap(), Some(child));
    }

    #[tokio::test]
    async fn test_create_node_rejects_foreign_parent() {
        let repo = setup_test_repo().await;
        let root = repo.create_node(1, None).await.unwrap();
        assert!(repo.create_node(2, Some(&root)).await.is_err());
    }

    #[tokio::test]
    async fn test_create_page_roundtrips_nullable_columns() {
        let repo = setup_test_repo().await;
        let node = repo.create_node(1, None).await.unwrap();
        let start = Utc::now() + Duration::days(1);
        let created = repo
            .create_page(&NewPage::draft(node.id, "page.html", "admin").window(Some(start), None))
            .await
            .unwrap();

        let loaded = repo.get_page(created.id).await.unwrap().unwrap();
        assert!(loaded.publisher_is_draft);
        assert_eq!(loaded.publisher_public_id, None);
        assert_eq!(loaded.publication_end_date, None);
        assert_eq!(
            loaded.publication_date.map(|d| d.timestamp()),
            Some(start.timestamp())
        );
    }

    #[tokio::test]
    async fn test_find_pages_by_path_and_variant() {
        let repo = setup_test_repo().await;
        let (_, draft, public) = published_pair(&repo, None, "about").await;
        published_pair(&repo, None, "contact").await;

        let drafts = repo
            .find_pages(&PageQuery::for_site(1, PageVariant::Draft).with_path("about"))
            .await
            .unwrap();
        assert_eq!(drafts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![draft.id]);

        let published = repo
            .find_pages(
                &PageQuery::for_site(1, PageVariant::Public)
                    .published(Utc::now())
                    .with_path("about"),
            )
            .await
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, public.id);

        let any = PageQuery::for_site(1, PageVariant::Any)
            .with_path("about")
            .in_language("en");
        assert_eq!(repo.find_pages(&any).await.unwrap().len(), 2);
        assert!(repo.exists(&any).await.unwrap());
        assert!(!repo
            .exists(&PageQuery::for_site(1, PageVariant::Any).with_path("about").in_language("de"))
            .await
            .unwrap());
        assert!(!repo
            .exists(&PageQuery::for_site(2, PageVariant::Any).with_path("about"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_find_titles_by_state() {
        let repo = setup_test_repo().await;
        let (_, draft, public) = published_pair(&repo, None, "about").await;

        let drafts = repo
            .find_titles(&TitleQuery::new("about", TitleState::Draft))
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].1.id, draft.id);
        assert!(drafts[0].0.publisher_is_draft);

        let published = repo
            .find_titles(&TitleQuery::new("about", TitleState::Published))
            .await
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1.id, public.id);
        assert_eq!(published[0].0.language, "en");
    }

    #[tokio::test]
    async fn test_hidden_and_out_of_window_ancestors() {
        let repo = setup_test_repo().await;
        let (parent_node, _, _) = published_pair(&repo, None, "docs").await;
        let (child_node, _, _) = published_pair(&repo, Some(&parent_node), "docs/intro").await;

        assert_eq!(
            repo.count_ancestors(&AncestorQuery::hidden(&child_node))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            repo.count_ancestors(&AncestorQuery::outside_window(&child_node, Utc::now()))
                .await
                .unwrap(),
            0
        );

        // A node whose only page is an unpublished draft hides its subtree.
        let lonely = repo.create_node(1, None).await.unwrap();
        repo.create_page(&NewPage::draft(lonely.id, "page.html", "admin"))
            .await
            .unwrap();
        let below = repo.create_node(1, Some(&lonely)).await.unwrap();
        assert_eq!(
            repo.count_ancestors(&AncestorQuery::hidden(&below))
                .await
                .unwrap(),
            1
        );

        // A parent whose page only starts tomorrow is outside its window.
        let future = repo.create_node(1, None).await.unwrap();
        repo.create_page(
            &NewPage::draft(future.id, "page.html", "admin")
                .window(Some(Utc::now() + Duration::days(1)), None),
        )
        .await
        .unwrap();
        let under_future = repo.create_node(1, Some(&future)).await.unwrap();
        assert_eq!(
            repo.count_ancestors(&AncestorQuery::outside_window(&under_future, Utc::now()))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_published_node_query() {
        let repo = setup_test_repo().await;
        let (published_node, _, _) = published_pair(&repo, None, "live").await;
        let draft_only = repo.create_node(1, None).await.unwrap();
        repo.create_page(&NewPage::draft(draft_only.id, "page.html", "admin"))
            .await
            .unwrap();

        let all = repo.find_nodes(&NodeQuery::for_site(1)).await.unwrap();
        assert_eq!(all.len(), 2);

        let published = repo
            .find_nodes(&NodeQuery::for_site(1).published(Utc::now()))
            .await
            .unwrap();
        assert_eq!(published, vec![published_node]);
    }

    #[tokio::test]
    async fn test_titles_for_page() {
        let repo = setup_test_repo().await;
        let (_, draft, _) = published_pair(&repo, None, "about").await;
        repo.create_title(&draft, &NewTitle::new("de", "Über uns", "ueber-uns"))
            .await
            .unwrap();

        let titles = repo.titles_for_page(draft.id).await.unwrap();
        let languages: Vec<_> = titles.iter().map(|t| t.language.as_str()).collect();
        assert_eq!(languages, vec!["de", "en"]);
        assert_eq!(titles[0].slug, "ueber-uns");
    }
}
