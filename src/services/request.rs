//! Per-request context for page resolution

use std::collections::HashMap;

use crate::models::{Page, User};

/// What page resolution needs to know about an incoming request
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Request path, including the pages root prefix
    pub path: String,
    /// Decoded query parameters
    pub query: HashMap<String, String>,
    /// Authenticated user, if any
    pub user: Option<User>,
    /// Whether the client asked for the editing view
    pub edit_mode: bool,
    /// Page already resolved for this request
    pub current_page: Option<Page>,
}

impl PageRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn editing(mut self) -> Self {
        self.edit_mode = true;
        self
    }

    /// Drafts are served only to authenticated users in edit mode
    pub fn use_draft(&self) -> bool {
        self.edit_mode && self.user.is_some()
    }

    pub fn is_preview(&self) -> bool {
        self.query.contains_key("preview")
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}
