//! Draft visibility

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Page, User, UserRole};
use crate::services::clean_username;

/// Decides who may see the draft variant of a page
#[async_trait]
pub trait PagePermissions: Send + Sync {
    async fn user_can_view_page_draft(&self, user: Option<&User>, page: &Page) -> Result<bool>;
}

/// Role based rules: admins and editors see every draft, authors only
/// the drafts they created.
pub struct RolePagePermissions {
    username_max_length: usize,
}

impl RolePagePermissions {
    pub fn new(username_max_length: usize) -> Self {
        Self {
            username_max_length,
        }
    }
}

#[async_trait]
impl PagePermissions for RolePagePermissions {
    async fn user_can_view_page_draft(&self, user: Option<&User>, page: &Page) -> Result<bool> {
        let Some(user) = user else {
            return Ok(false);
        };
        Ok(match user.role {
            UserRole::Admin | UserRole::Editor => true,
            UserRole::Author => {
                page.created_by == clean_username(Some(user), self.username_max_length)
            }
        })
    }
}
