//! Page tree content management: typed pages in a materialized-path tree,
//! per-page sub-routing, blog archives and template helpers.

pub mod archive;
pub mod compat;
pub mod config;
pub mod link;
pub mod model;
pub mod page;
pub mod paginate;
pub mod routing;
pub mod site;
pub mod templatetags;
pub mod tree;
pub mod views;

pub use model::ApiError;
pub use page::{Page, PageId, PageKind, PageType};
pub use site::Site;
pub use tree::PageTree;
