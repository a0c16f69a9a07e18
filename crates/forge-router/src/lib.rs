//! The HTTP surface: the canonical-dialect proxy routes and the narrow
//! ambient admin surface (health, registered providers).

mod admin;
mod proxy;

pub use admin::admin_router;
pub use proxy::proxy_router;
