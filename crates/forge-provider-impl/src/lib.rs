//! Built-in upstream provider adapters: one `UpstreamProvider` impl per
//! upstream dialect, plus the shared HTTP client, SSE bridge, and SigV4
//! signer they're built on.

mod builtin;
mod client;
mod providers;
mod registry;
mod sigv4;
mod sse_bridge;
mod validate;

pub use builtin::{BuiltinProviderSeed, builtin_provider_seeds};
pub use registry::register_builtin_providers;
