//! Page and node filters for one site
//!
//! Pure composition over `db::query`; nothing here runs a query.

use chrono::{DateTime, Utc};

use crate::db::query::{NodeQuery, PageQuery};
use crate::models::{PageVariant, Site};

/// Nodes of `site`; with `published`, only nodes whose public page is live at `now`
pub fn node_queryset(site: &Site, published: bool, now: DateTime<Utc>) -> NodeQuery {
    let query = NodeQuery::for_site(site.id);
    if published {
        query.published(now)
    } else {
        query
    }
}

/// Draft pages of `site`, or its public pages
pub fn page_queryset(site: &Site, draft: bool) -> PageQuery {
    PageQuery::for_site(site.id, PageVariant::from_draft_flag(draft))
}

/// Pages answering `path`; the home page for an empty path
pub fn pages_from_path(
    site: &Site,
    path: &str,
    preview: bool,
    draft: bool,
    now: DateTime<Utc>,
) -> PageQuery {
    let mut query = page_queryset(site, draft);
    if !(draft || preview) {
        query = query.published(now);
    }
    narrow_to_path(query, path)
}

/// Draft and public pages at `path` with a title in `language`
pub fn all_pages_from_path(site: &Site, path: &str, language: &str) -> PageQuery {
    let query = page_queryset(site, true).with_variant(PageVariant::Any);
    narrow_to_path(query, path.trim_matches('/')).in_language(language)
}

fn narrow_to_path(query: PageQuery, path: &str) -> PageQuery {
    if path.is_empty() {
        query.home()
    } else {
        query.with_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site {
        Site {
            id: 3,
            domain: "example.com".to_string(),
            name: "Example".to_string(),
        }
    }

    #[test]
    fn test_published_unless_draft_or_preview() {
        let now = Utc::now();
        assert_eq!(
            pages_from_path(&site(), "about", false, false, now).published_at,
            Some(now)
        );
        assert_eq!(pages_from_path(&site(), "about", true, false, now).published_at, None);
        assert_eq!(pages_from_path(&site(), "about", false, true, now).published_at, None);
    }

    #[test]
    fn test_empty_path_selects_home() {
        let query = pages_from_path(&site(), "", false, true, Utc::now());
        assert!(query.home_only);
        assert_eq!(query.path, None);
        assert_eq!(query.variant, PageVariant::Draft);
    }

    #[test]
    fn test_all_pages_trims_slashes_and_spans_variants() {
        let query = all_pages_from_path(&site(), "/docs/intro/", "en");
        assert_eq!(query.variant, PageVariant::Any);
        assert_eq!(query.path.as_deref(), Some("docs/intro"));
        assert_eq!(query.language.as_deref(), Some("en"));
        assert_eq!(query.published_at, None);
        assert_eq!(query.site_id, 3);
    }

    #[test]
    fn test_node_queryset() {
        let now = Utc::now();
        assert_eq!(node_queryset(&site(), false, now).published_at, None);
        assert_eq!(node_queryset(&site(), true, now).published_at, Some(now));
    }
}
