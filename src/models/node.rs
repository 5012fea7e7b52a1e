//! Page tree nodes
//!
//! A node places a page in the tree of one site. Positions are stored as a
//! materialized path: every level adds `NODE_PATH_STEP` base-36 characters,
//! so the ancestors of `00010003` are exactly the nodes at `0001`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters per tree level in `PageNode::path`
pub const NODE_PATH_STEP: usize = 4;

/// Largest child position one path step can encode (`ZZZZ`)
pub const MAX_CHILDREN: u32 = 36 * 36 * 36 * 36 - 1;

const PATH_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: i64,
    pub site_id: i64,
    pub parent_id: Option<i64>,
    pub path: String,
    pub depth: i32,
    pub created_at: DateTime<Utc>,
}

impl PageNode {
    /// Paths of every ancestor, root first. The node's own path is excluded.
    pub fn ancestor_paths(&self) -> Vec<String> {
        let levels = self.path.len() / NODE_PATH_STEP;
        (1..levels)
            .map(|level| self.path[..level * NODE_PATH_STEP].to_string())
            .collect()
    }

    /// Path segment for the `position`-th child (1-based) of some node.
    /// None once `position` exceeds `MAX_CHILDREN`.
    pub fn path_step(position: u32) -> Option<String> {
        if position > MAX_CHILDREN {
            return None;
        }
        let mut value = position;
        let mut step = [b'0'; NODE_PATH_STEP];
        for slot in step.iter_mut().rev() {
            *slot = PATH_ALPHABET[(value % 36) as usize];
            value /= 36;
        }
        // Only ASCII from the alphabet was written.
        Some(String::from_utf8_lossy(&step).into_owned())
    }

    /// Inverse of `path_step` for the last level of a path
    pub fn last_step_position(path: &str) -> Option<u32> {
        let start = path.len().checked_sub(NODE_PATH_STEP)?;
        u32::from_str_radix(path.get(start..)?, 36).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(path: &str) -> PageNode {
        PageNode {
            id: 1,
            site_id: 1,
            parent_id: None,
            path: path.to_string(),
            depth: (path.len() / NODE_PATH_STEP) as i32,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_root_has_no_ancestors() {
        assert!(node("0001").ancestor_paths().is_empty());
    }

    #[test]
    fn test_ancestor_paths_root_first() {
        assert_eq!(
            node("000100020003").ancestor_paths(),
            vec!["0001".to_string(), "00010002".to_string()]
        );
    }

    #[test]
    fn test_path_step_is_fixed_width_base36() {
        assert_eq!(PageNode::path_step(1).as_deref(), Some("0001"));
        assert_eq!(PageNode::path_step(35).as_deref(), Some("000Z"));
        assert_eq!(PageNode::path_step(36).as_deref(), Some("0010"));
    }

    #[test]
    fn test_path_step_rejects_positions_past_one_level() {
        assert_eq!(PageNode::path_step(MAX_CHILDREN).as_deref(), Some("ZZZZ"));
        assert_eq!(PageNode::path_step(MAX_CHILDREN + 1), None);
    }

    #[test]
    fn test_last_step_position() {
        assert_eq!(PageNode::last_step_position("00010010"), Some(36));
        assert_eq!(PageNode::last_step_position("01"), None);
    }
}
