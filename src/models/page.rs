//! Page model
//!
//! Every page exists as an editable draft and, once published, a public
//! copy. Both variants point at the same tree node; the draft links to its
//! public copy through `publisher_public_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{PageNode, Title};

/// Which lifecycle variant of a page a query is after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageVariant {
    Draft,
    Public,
    /// Both variants
    Any,
}

impl PageVariant {
    pub fn from_draft_flag(draft: bool) -> Self {
        if draft {
            Self::Draft
        } else {
            Self::Public
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub node_id: i64,
    pub publisher_is_draft: bool,
    pub publisher_public_id: Option<i64>,
    pub is_home: bool,
    pub template: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub publication_end_date: Option<DateTime<Utc>>,
    pub created_by: String,
    pub changed_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Node on the site the page was resolved for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<PageNode>,
    /// Titles already looked up, keyed by language
    #[serde(default, rename = "titles")]
    pub title_cache: BTreeMap<String, Title>,
}

impl Page {
    /// Whether `now` falls inside the page's publication window
    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        let started = self.publication_date.map_or(true, |start| start <= now);
        let not_ended = self.publication_end_date.map_or(true, |end| end > now);
        started && not_ended
    }

    pub fn get_template(&self) -> &str {
        &self.template
    }

    /// Cached title for `language`, falling back to any cached title
    pub fn title_for(&self, language: Option<&str>) -> Option<&Title> {
        language
            .and_then(|lang| self.title_cache.get(lang))
            .or_else(|| self.title_cache.values().next())
    }
}

/// Input for creating a page row
#[derive(Debug, Clone)]
pub struct NewPage {
    pub node_id: i64,
    pub publisher_is_draft: bool,
    pub publisher_public_id: Option<i64>,
    pub is_home: bool,
    pub template: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub publication_end_date: Option<DateTime<Utc>>,
    pub created_by: String,
}

impl NewPage {
    pub fn draft(node_id: i64, template: &str, created_by: &str) -> Self {
        Self {
            node_id,
            publisher_is_draft: true,
            publisher_public_id: None,
            is_home: false,
            template: template.to_string(),
            publication_date: None,
            publication_end_date: None,
            created_by: created_by.to_string(),
        }
    }

    /// Public counterpart of a draft, sharing its node and window
    pub fn public_of(draft: &Page) -> Self {
        Self {
            node_id: draft.node_id,
            publisher_is_draft: false,
            publisher_public_id: None,
            is_home: draft.is_home,
            template: draft.template.clone(),
            publication_date: draft.publication_date,
            publication_end_date: draft.publication_end_date,
            created_by: draft.created_by.clone(),
        }
    }

    pub fn home(mut self) -> Self {
        self.is_home = true;
        self
    }

    pub fn window(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.publication_date = start;
        self.publication_end_date = end;
        self
    }
}
