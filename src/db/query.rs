//! Composable page, node and title filters
//!
//! Filters are plain values: building one never touches the database.
//! Repositories render them with `to_select` / `to_count` into a
//! `SqlStatement` whose `?` placeholders work on both SQLite and MySQL.

use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlArguments;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Sqlite};

use crate::models::{PageNode, PageVariant};

pub(crate) const PAGE_COLUMNS: &str = "p.id, p.node_id, p.publisher_is_draft, p.publisher_public_id, \
     p.is_home, p.template, p.publication_date, p.publication_end_date, \
     p.created_by, p.changed_by, p.created_at, p.updated_at";

pub(crate) const NODE_COLUMNS: &str = "n.id, n.site_id, n.parent_id, n.path, n.depth, n.created_at";

pub(crate) const TITLE_COLUMNS: &str = "t.id AS title_id, t.page_id AS title_page_id, \
     t.language AS title_language, t.title AS title_title, t.slug AS title_slug, \
     t.path AS title_path, t.published AS title_published, \
     t.publisher_is_draft AS title_publisher_is_draft";

/// A value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Bool(bool),
    Text(String),
    Time(DateTime<Utc>),
}

/// Rendered SQL plus its bind values, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    pub fn bind(mut self, value: SqlValue) -> Self {
        self.binds.push(value);
        self
    }

    pub fn sqlite_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        self.binds
            .iter()
            .fold(sqlx::query(&self.sql), |query, value| match value {
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Bool(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
                SqlValue::Time(v) => query.bind(*v),
            })
    }

    pub fn mysql_query(&self) -> Query<'_, MySql, MySqlArguments> {
        self.binds
            .iter()
            .fold(sqlx::query(&self.sql), |query, value| match value {
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::Bool(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
                SqlValue::Time(v) => query.bind(*v),
            })
    }
}

/// WHERE clause accumulator
#[derive(Debug, Default)]
struct Conditions {
    clauses: Vec<String>,
    binds: Vec<SqlValue>,
}

impl Conditions {
    fn push(&mut self, clause: impl Into<String>, binds: impl IntoIterator<Item = SqlValue>) {
        self.clauses.push(clause.into());
        self.binds.extend(binds);
    }

    fn render(self, head: &str, tail: &str) -> SqlStatement {
        let mut sql = head.to_string();
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        sql.push_str(tail);
        SqlStatement {
            sql,
            binds: self.binds,
        }
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Window clause for alias `p`, binding `now` twice
fn publication_window(now: DateTime<Utc>) -> (String, [SqlValue; 2]) {
    (
        "(p.publication_date IS NULL OR p.publication_date <= ?) \
         AND (p.publication_end_date IS NULL OR p.publication_end_date > ?)"
            .to_string(),
        [SqlValue::Time(now), SqlValue::Time(now)],
    )
}

fn title_exists(clause: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM titles t WHERE t.page_id = p.id AND {})",
        clause
    )
}

/// Filter over pages of one site
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub site_id: i64,
    pub variant: PageVariant,
    /// Only pages published at this instant with a published title
    pub published_at: Option<DateTime<Utc>>,
    /// Only pages with a title at this path
    pub path: Option<String>,
    pub home_only: bool,
    /// Only pages with a title in this language
    pub language: Option<String>,
}

impl PageQuery {
    pub fn for_site(site_id: i64, variant: PageVariant) -> Self {
        Self {
            site_id,
            variant,
            published_at: None,
            path: None,
            home_only: false,
            language: None,
        }
    }

    pub fn published(mut self, now: DateTime<Utc>) -> Self {
        self.published_at = Some(now);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn home(mut self) -> Self {
        self.home_only = true;
        self
    }

    pub fn in_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_variant(mut self, variant: PageVariant) -> Self {
        self.variant = variant;
        self
    }

    fn conditions(&self) -> Conditions {
        let mut conds = Conditions::default();
        conds.push("n.site_id = ?", [SqlValue::Int(self.site_id)]);

        match self.variant {
            PageVariant::Draft => conds.push("p.publisher_is_draft = ?", [SqlValue::Bool(true)]),
            PageVariant::Public => conds.push("p.publisher_is_draft = ?", [SqlValue::Bool(false)]),
            PageVariant::Any => {}
        }

        if let Some(now) = self.published_at {
            let (clause, binds) = publication_window(now);
            conds.push(clause, binds);
        }

        // Each title condition may be met by a different title of the page.
        if self.published_at.is_some() {
            conds.push(title_exists("t.published = ?"), [SqlValue::Bool(true)]);
        }
        if let Some(path) = &self.path {
            conds.push(title_exists("t.path = ?"), [SqlValue::Text(path.clone())]);
        }
        if let Some(language) = &self.language {
            conds.push(
                title_exists("t.language = ?"),
                [SqlValue::Text(language.clone())],
            );
        }

        if self.home_only {
            conds.push("p.is_home = ?", [SqlValue::Bool(true)]);
        }

        conds
    }

    pub fn to_select(&self) -> SqlStatement {
        self.conditions().render(
            &format!(
                "SELECT {} FROM pages p INNER JOIN page_nodes n ON n.id = p.node_id",
                PAGE_COLUMNS
            ),
            " ORDER BY p.id",
        )
    }

    pub fn to_count(&self) -> SqlStatement {
        self.conditions().render(
            "SELECT COUNT(*) AS count FROM pages p INNER JOIN page_nodes n ON n.id = p.node_id",
            "",
        )
    }
}

/// Filter over the tree nodes of one site
#[derive(Debug, Clone, PartialEq)]
pub struct NodeQuery {
    pub site_id: i64,
    /// Only nodes whose public page is published at this instant
    pub published_at: Option<DateTime<Utc>>,
}

impl NodeQuery {
    pub fn for_site(site_id: i64) -> Self {
        Self {
            site_id,
            published_at: None,
        }
    }

    pub fn published(mut self, now: DateTime<Utc>) -> Self {
        self.published_at = Some(now);
        self
    }

    pub fn to_select(&self) -> SqlStatement {
        let mut conds = Conditions::default();
        conds.push("n.site_id = ?", [SqlValue::Int(self.site_id)]);

        if let Some(now) = self.published_at {
            let (window, window_binds) = publication_window(now);
            let mut binds = vec![SqlValue::Bool(false)];
            binds.extend(window_binds);
            binds.push(SqlValue::Bool(true));
            conds.push(
                format!(
                    "EXISTS (SELECT 1 FROM pages p WHERE p.node_id = n.id \
                     AND p.publisher_is_draft = ? AND {} \
                     AND EXISTS (SELECT 1 FROM titles t WHERE t.page_id = p.id AND t.published = ?))",
                    window
                ),
                binds,
            );
        }

        conds.render(
            &format!("SELECT {} FROM page_nodes n", NODE_COLUMNS),
            " ORDER BY n.path",
        )
    }
}

/// Lifecycle state a path lookup resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleState {
    /// Editable titles
    Draft,
    /// Public titles, published or not
    Preview,
    /// Public titles that are published
    Published,
}

impl TitleState {
    /// `draft` wins over `preview`
    pub fn from_flags(preview: bool, draft: bool) -> Self {
        if draft {
            Self::Draft
        } else if preview {
            Self::Preview
        } else {
            Self::Published
        }
    }

    pub fn published_only(self) -> bool {
        self == Self::Published
    }
}

/// Titles at one path, joined with their pages
#[derive(Debug, Clone, PartialEq)]
pub struct TitleQuery {
    pub path: String,
    pub state: TitleState,
}

impl TitleQuery {
    pub fn new(path: impl Into<String>, state: TitleState) -> Self {
        Self {
            path: path.into(),
            state,
        }
    }

    pub fn to_select(&self) -> SqlStatement {
        let mut conds = Conditions::default();
        match self.state {
            TitleState::Draft => {
                conds.push("t.publisher_is_draft = ?", [SqlValue::Bool(true)]);
            }
            TitleState::Preview => {
                conds.push("t.publisher_is_draft = ?", [SqlValue::Bool(false)]);
            }
            TitleState::Published => {
                conds.push("t.published = ?", [SqlValue::Bool(true)]);
                conds.push("t.publisher_is_draft = ?", [SqlValue::Bool(false)]);
            }
        }
        conds.push("t.path = ?", [SqlValue::Text(self.path.clone())]);

        conds.render(
            &format!(
                "SELECT {}, {} FROM titles t INNER JOIN pages p ON p.id = t.page_id",
                TITLE_COLUMNS, PAGE_COLUMNS
            ),
            " ORDER BY t.id",
        )
    }
}

/// Checks over the ancestors of one node
#[derive(Debug, Clone, PartialEq)]
pub enum AncestorQuery {
    /// Ancestors without a public page carrying a published title
    Hidden { site_id: i64, paths: Vec<String> },
    /// Ancestors with a page whose window starts after or ended before `now`
    OutsideWindow {
        site_id: i64,
        paths: Vec<String>,
        now: DateTime<Utc>,
    },
}

impl AncestorQuery {
    pub fn hidden(node: &PageNode) -> Self {
        Self::Hidden {
            site_id: node.site_id,
            paths: node.ancestor_paths(),
        }
    }

    pub fn outside_window(node: &PageNode, now: DateTime<Utc>) -> Self {
        Self::OutsideWindow {
            site_id: node.site_id,
            paths: node.ancestor_paths(),
            now,
        }
    }

    pub fn paths(&self) -> &[String] {
        match self {
            Self::Hidden { paths, .. } | Self::OutsideWindow { paths, .. } => paths,
        }
    }

    /// Renders a `count` query; callers skip it when `paths()` is empty
    pub fn to_count(&self) -> SqlStatement {
        let mut conds = Conditions::default();
        let (site_id, paths) = match self {
            Self::Hidden { site_id, paths } | Self::OutsideWindow { site_id, paths, .. } => {
                (*site_id, paths)
            }
        };
        conds.push("n.site_id = ?", [SqlValue::Int(site_id)]);
        conds.push(
            format!("n.path IN ({})", placeholders(paths.len())),
            paths.iter().cloned().map(SqlValue::Text),
        );

        match self {
            Self::Hidden { .. } => {
                conds.push(
                    "NOT EXISTS (SELECT 1 FROM pages p INNER JOIN titles t ON t.page_id = p.id \
                     WHERE p.node_id = n.id AND p.publisher_is_draft = ? AND t.published = ?)",
                    [SqlValue::Bool(false), SqlValue::Bool(true)],
                );
                conds.render("SELECT COUNT(*) AS count FROM page_nodes n", "")
            }
            Self::OutsideWindow { now, .. } => {
                conds.push(
                    "((p.publication_date IS NOT NULL AND p.publication_date > ?) \
                     OR (p.publication_end_date IS NOT NULL AND p.publication_end_date < ?))",
                    [SqlValue::Time(*now), SqlValue::Time(*now)],
                );
                conds.render(
                    "SELECT COUNT(*) AS count FROM page_nodes n INNER JOIN pages p ON p.node_id = n.id",
                    "",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholder_count(stmt: &SqlStatement) -> usize {
        stmt.sql.matches('?').count()
    }

    #[test]
    fn test_draft_page_query_filters_variant_only() {
        let stmt = PageQuery::for_site(1, PageVariant::Draft).to_select();
        assert!(stmt.sql.contains("p.publisher_is_draft = ?"));
        assert!(!stmt.sql.contains("EXISTS"));
        assert_eq!(stmt.binds, vec![SqlValue::Int(1), SqlValue::Bool(true)]);
    }

    #[test]
    fn test_any_variant_has_no_draft_clause() {
        let stmt = PageQuery::for_site(2, PageVariant::Any).to_count();
        assert!(!stmt.sql.contains("publisher_is_draft"));
        assert_eq!(stmt.binds, vec![SqlValue::Int(2)]);
    }

    #[test]
    fn test_title_conditions_are_independent() {
        let now = Utc::now();
        let stmt = PageQuery::for_site(1, PageVariant::Public)
            .published(now)
            .with_path("about/team")
            .in_language("en")
            .to_select();

        assert_eq!(stmt.sql.matches("FROM titles t").count(), 3);
        assert!(stmt.sql.contains("t.page_id = p.id AND t.path = ?)"));
        assert!(!stmt.sql.contains("t.path = ? AND t.language = ?"));
        assert_eq!(placeholder_count(&stmt), stmt.binds.len());
        assert_eq!(
            stmt.binds,
            vec![
                SqlValue::Int(1),
                SqlValue::Bool(false),
                SqlValue::Time(now),
                SqlValue::Time(now),
                SqlValue::Bool(true),
                SqlValue::Text("about/team".to_string()),
                SqlValue::Text("en".to_string()),
            ]
        );
    }

    #[test]
    fn test_home_query() {
        let stmt = PageQuery::for_site(1, PageVariant::Draft).home().to_select();
        assert!(stmt.sql.contains("p.is_home = ?"));
        assert!(stmt.sql.ends_with("ORDER BY p.id"));
    }

    #[test]
    fn test_published_node_query_binds_match_placeholders() {
        let stmt = NodeQuery::for_site(4).published(Utc::now()).to_select();
        assert_eq!(placeholder_count(&stmt), stmt.binds.len());
        assert!(stmt.sql.ends_with("ORDER BY n.path"));

        let plain = NodeQuery::for_site(4).to_select();
        assert_eq!(plain.binds, vec![SqlValue::Int(4)]);
    }

    #[test]
    fn test_title_state_precedence() {
        assert_eq!(TitleState::from_flags(true, true), TitleState::Draft);
        assert_eq!(TitleState::from_flags(true, false), TitleState::Preview);
        assert_eq!(TitleState::from_flags(false, false), TitleState::Published);
        assert!(TitleState::Published.published_only());
        assert!(!TitleState::Preview.published_only());
    }

    #[test]
    fn test_published_title_query() {
        let stmt = TitleQuery::new("", TitleState::Published).to_select();
        assert_eq!(
            stmt.binds,
            vec![
                SqlValue::Bool(true),
                SqlValue::Bool(false),
                SqlValue::Text(String::new()),
            ]
        );
        assert!(stmt.sql.ends_with("ORDER BY t.id"));
    }

    #[test]
    fn test_ancestor_queries_expand_in_list() {
        let node = PageNode {
            id: 9,
            site_id: 3,
            parent_id: Some(8),
            path: "000100020003".to_string(),
            depth: 3,
            created_at: Utc::now(),
        };

        let hidden = AncestorQuery::hidden(&node).to_count();
        assert!(hidden.sql.contains("n.path IN (?, ?)"));
        assert_eq!(placeholder_count(&hidden), hidden.binds.len());

        let now = Utc::now();
        let window = AncestorQuery::outside_window(&node, now);
        assert_eq!(window.paths(), ["0001".to_string(), "00010002".to_string()]);
        let stmt = window.to_count();
        assert_eq!(placeholder_count(&stmt), stmt.binds.len());
        assert_eq!(stmt.binds.last(), Some(&SqlValue::Time(now)));
    }
}
