//! Data models
//!
//! Entities read and written through the repositories:
//! - Site, PageNode, Page and Title make up the page tree
//! - User and Session identify who is asking for a page

mod node;
mod page;
mod session;
mod site;
mod title;
mod user;

pub use node::{PageNode, MAX_CHILDREN, NODE_PATH_STEP};
pub use page::{NewPage, Page, PageVariant};
pub use session::Session;
pub use site::Site;
pub use title::{NewTitle, Title};
pub use user::{User, UserRole};
