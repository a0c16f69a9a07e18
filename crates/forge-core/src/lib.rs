pub mod auth;
pub mod bootstrap;
pub mod bridge;
pub mod error;
pub mod resolver;
pub mod usage;

pub use auth::{AuthContext, authenticate};
pub use bootstrap::AppState;
pub use bridge::stream_response;
pub use error::GatewayError;
pub use resolver::{ResolvedRoute, load_tenant_credentials, resolve};
pub use usage::{UsageHandle, finalize_detached, precheck_and_open};
