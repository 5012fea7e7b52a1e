//! Site model

use serde::{Deserialize, Serialize};

/// A site served from the shared page tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub domain: String,
    pub name: String,
}
