//! Title model: the per-language slug and path of a page

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub id: i64,
    pub page_id: i64,
    pub language: String,
    pub title: String,
    pub slug: String,
    /// Full path below the pages root, without leading or trailing slash
    pub path: String,
    pub published: bool,
    pub publisher_is_draft: bool,
}

/// Input for creating a title
#[derive(Debug, Clone, Deserialize)]
pub struct NewTitle {
    pub language: String,
    pub title: String,
    pub slug: String,
    pub path: String,
    #[serde(default)]
    pub published: bool,
}

impl NewTitle {
    pub fn new(language: &str, title: &str, path: &str) -> Self {
        let slug = path.rsplit('/').next().unwrap_or(path);
        Self {
            language: language.to_string(),
            title: title.to_string(),
            slug: slug.to_string(),
            path: path.to_string(),
            published: false,
        }
    }

    pub fn published(mut self) -> Self {
        self.published = true;
        self
    }
}
