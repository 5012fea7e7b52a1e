//! Username formatting for `created_by` / `changed_by`

use crate::models::User;

/// Stored for requests without a usable user
pub const ANONYMOUS: &str = "anonymous";

/// Render `user` for the audit columns, capped at `max_length` characters.
///
/// Long names keep their first `max_length - 15` characters followed by
/// `... (id=<id>)`.
pub fn clean_username(user: Option<&User>, max_length: usize) -> String {
    let user = match user {
        Some(user) if !user.username.is_empty() => user,
        _ => return ANONYMOUS.to_string(),
    };

    if user.username.chars().count() <= max_length {
        return user.username.clone();
    }

    let kept: String = user
        .username
        .chars()
        .take(max_length.saturating_sub(15))
        .collect();
    format!("{}... (id={})", kept, user.id)
}
