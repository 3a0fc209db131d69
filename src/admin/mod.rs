//! Generic JSON admin over every registered model.

pub mod auth;
pub mod changelist;
pub mod handlers;
pub mod model_admin;
pub mod site;

pub use handlers::router;
pub use model_admin::{InlineAdmin, ModelAdmin, DISPLAY};
pub use site::{AdminResource, AdminSite};

/// One record as the admin sees it.
pub type Row = serde_json::Map<String, serde_json::Value>;
