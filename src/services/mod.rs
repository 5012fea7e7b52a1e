//! Services layer - Business logic
//!
//! Page resolution and the helpers around it. Services coordinate the
//! repositories; the pure helpers (template selection, username
//! formatting, slug suffixing, filter composition) do no I/O.

pub mod page;
pub mod permissions;
pub mod queryset;
pub mod request;
pub mod session;
pub mod slug;
pub mod template;
pub mod username;

pub use page::{PageService, PageServiceError};
pub use permissions::{PagePermissions, RolePagePermissions};
pub use request::PageRequest;
pub use session::SessionService;
pub use slug::next_copy_slug;
pub use template::select_template;
pub use username::{clean_username, ANONYMOUS};
