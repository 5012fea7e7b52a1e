//! Page service
//!
//! Resolves request paths to pages, lists pages and nodes of a site, finds
//! free slugs and copies pages.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::CmsConfig;
use crate::db::query::{AncestorQuery, NodeQuery, PageQuery, TitleQuery, TitleState};
use crate::db::repositories::PageRepository;
use crate::models::{NewPage, NewTitle, Page, PageNode, Site, User};
use crate::services::queryset;
use crate::services::slug::{join_path, next_copy_slug, split_path};
use crate::services::{clean_username, PagePermissions, PageRequest};

/// Error types for page service operations
#[derive(Debug, thiserror::Error)]
pub enum PageServiceError {
    #[error("Page not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

type Result<T> = std::result::Result<T, PageServiceError>;

pub struct PageService {
    repo: Arc<dyn PageRepository>,
    permissions: Arc<dyn PagePermissions>,
    pages_root: String,
    username_max_length: usize,
}

impl PageService {
    pub fn new(
        repo: Arc<dyn PageRepository>,
        permissions: Arc<dyn PagePermissions>,
        config: &CmsConfig,
    ) -> Self {
        Self {
            repo,
            permissions,
            pages_root: config.pages_root.clone(),
            username_max_length: config.username_max_length,
        }
    }

    pub fn node_queryset(&self, site: &Site, published: bool) -> NodeQuery {
        queryset::node_queryset(site, published, Utc::now())
    }

    pub fn page_queryset(&self, site: &Site, draft: bool) -> PageQuery {
        queryset::page_queryset(site, draft)
    }

    pub fn pages_from_path(&self, site: &Site, path: &str, preview: bool, draft: bool) -> PageQuery {
        queryset::pages_from_path(site, path, preview, draft, Utc::now())
    }

    pub fn all_pages_from_path(&self, site: &Site, path: &str, language: &str) -> PageQuery {
        queryset::all_pages_from_path(site, path, language)
    }

    pub async fn find_nodes(&self, site: &Site, published: bool) -> Result<Vec<PageNode>> {
        Ok(self
            .repo
            .find_nodes(&self.node_queryset(site, published))
            .await?)
    }

    pub async fn find_pages(
        &self,
        site: &Site,
        path: &str,
        preview: bool,
        draft: bool,
    ) -> Result<Vec<Page>> {
        Ok(self
            .repo
            .find_pages(&self.pages_from_path(site, path, preview, draft))
            .await?)
    }

    /// A page is reachable when it is live and no ancestor is hidden
    async fn is_reachable(&self, page: &Page, node: &PageNode, now: DateTime<Utc>) -> Result<bool> {
        if !page.is_published_at(now) {
            return Ok(false);
        }
        Ok(self.repo.count_ancestors(&AncestorQuery::hidden(node)).await? == 0)
    }

    /// Resolve a path below the pages root to a single page.
    ///
    /// Candidates are scanned in title order; the first one with a node on
    /// `site` (and, for published content, reachable) wins. The returned
    /// page carries its node and the matching title.
    pub async fn page_from_path(
        &self,
        site: &Site,
        path: &str,
        preview: bool,
        draft: bool,
    ) -> Result<Option<Page>> {
        let state = TitleState::from_flags(preview, draft);
        let candidates = self.repo.find_titles(&TitleQuery::new(path, state)).await?;
        let now = Utc::now();

        for (title, mut page) in candidates {
            let node = match self.repo.get_node(page.node_id).await? {
                Some(node) if node.site_id == site.id => node,
                _ => {
                    tracing::debug!(
                        "Skipping page {} at '{}': no node on site {}",
                        page.id,
                        path,
                        site.id
                    );
                    continue;
                }
            };

            if state.published_only() && !self.is_reachable(&page, &node, now).await? {
                tracing::debug!("Skipping unreachable page {} at '{}'", page.id, path);
                continue;
            }

            page.node = Some(node);
            page.title_cache.clear();
            page.title_cache.insert(title.language.clone(), title);
            return Ok(Some(page));
        }

        Ok(None)
    }

    /// Resolve the page a request is addressed to.
    ///
    /// `use_path` replaces the request path; `clean_path` defaults to
    /// stripping the pages root only when no explicit path is given.
    pub async fn page_from_request(
        &self,
        site: &Site,
        request: &PageRequest,
        use_path: Option<&str>,
        clean_path: Option<bool>,
    ) -> Result<Option<Page>> {
        if let Some(page) = &request.current_page {
            return Ok(Some(page.clone()));
        }

        let clean_path = clean_path.unwrap_or_else(|| use_path.map_or(true, str::is_empty));
        let draft = request.use_draft();
        let preview = request.is_preview();

        let mut path = use_path.unwrap_or(request.path.as_str());
        if clean_path {
            path = path.strip_prefix(self.pages_root.as_str()).unwrap_or(path);
            path = path.strip_suffix('/').unwrap_or(path);
        }

        let mut page = self.page_from_path(site, path, preview, draft).await?;

        let denied = match (&page, draft) {
            (Some(found), true) => !self
                .permissions
                .user_can_view_page_draft(request.user.as_ref(), found)
                .await?,
            _ => false,
        };
        if denied {
            tracing::debug!("Draft at '{}' not visible, using public page", path);
            page = self.page_from_path(site, path, preview, false).await?;
        }

        // Only plain public views check ancestor windows; a draft fallback skips it.
        if !draft {
            if let Some(node) = page.as_ref().and_then(|p| p.node.as_ref()) {
                let hidden = self
                    .repo
                    .count_ancestors(&AncestorQuery::outside_window(node, Utc::now()))
                    .await?;
                if hidden > 0 {
                    tracing::debug!("Page at '{}' has an ancestor outside its window", path);
                    page = None;
                }
            }
        }

        Ok(page)
    }

    /// First free slug for `path` in `language`, suffixing copies as needed
    pub async fn available_slug(&self, site: &Site, path: &str, language: &str) -> Result<String> {
        let (base, slug) = split_path(path);
        let mut slug = slug.to_string();
        let mut candidate = path.to_string();

        while self
            .repo
            .exists(&self.all_pages_from_path(site, &candidate, language))
            .await?
        {
            slug = next_copy_slug(&slug);
            candidate = join_path(base, &slug);
            tracing::debug!("Slug taken, trying '{}'", candidate);
        }

        Ok(slug)
    }

    /// Copy a draft page as the next sibling of its node.
    ///
    /// Every title of the source gets a free slug in its language; the copy
    /// is an unpublished draft owned by `user`.
    pub async fn copy_page(&self, site: &Site, page_id: i64, user: Option<&User>) -> Result<Page> {
        let source = self
            .repo
            .get_page(page_id)
            .await?
            .ok_or_else(|| PageServiceError::NotFound(page_id.to_string()))?;
        if !source.publisher_is_draft {
            return Err(PageServiceError::ValidationError(format!(
                "Page {} is not a draft",
                page_id
            )));
        }

        let node = self
            .repo
            .get_node(source.node_id)
            .await?
            .filter(|node| node.site_id == site.id)
            .ok_or_else(|| PageServiceError::NotFound(page_id.to_string()))?;
        let parent = match node.parent_id {
            Some(parent_id) => self.repo.get_node(parent_id).await?,
            None => None,
        };

        let new_node = self.repo.create_node(site.id, parent.as_ref()).await?;
        let created_by = clean_username(user, self.username_max_length);
        let mut copy = self
            .repo
            .create_page(
                &NewPage::draft(new_node.id, &source.template, &created_by)
                    .window(source.publication_date, source.publication_end_date),
            )
            .await?;

        for title in self.repo.titles_for_page(source.id).await? {
            let slug = self.available_slug(site, &title.path, &title.language).await?;
            let (base, _) = split_path(&title.path);
            let path = join_path(base, &slug);
            let created = self
                .repo
                .create_title(&copy, &NewTitle::new(&title.language, &title.title, &path))
                .await?;
            copy.title_cache.insert(created.language.clone(), created);
        }

        tracing::info!("Copied page {} to {} as '{}'", source.id, copy.id, created_by);
        copy.node = Some(new_node);
        Ok(copy)
    }
}
