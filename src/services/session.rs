//! Session validation
//!
//! Maps a session token to its user. Expired sessions are removed on sight.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::User;

pub struct SessionService {
    session_repo: Arc<dyn SessionRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl SessionService {
    pub fn new(session_repo: Arc<dyn SessionRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self {
            session_repo,
            user_repo,
        }
    }

    /// User behind `token`, or None for unknown and expired sessions
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {}", e);
            }
            return Ok(None);
        }

        self.user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")
    }
}
