//! Core provider abstractions for the gateway: the opaque credential
//! model, the adapter contract, the static adapter registry, and the
//! operational event fan-out.
//!
//! This crate intentionally does **not** depend on axum or any concrete
//! HTTP client. Provider implementations (in `forge-provider-impl`)
//! construct their own upstream requests with `reqwest`; this crate only
//! defines the shapes they agree on.

pub mod credential;
pub mod errors;
pub mod events;
pub mod headers;
pub mod provider;
pub mod registry;

pub use credential::{Credential, mask_credential, mask_secret};
pub use errors::{ProviderError, ProviderResult};
pub use events::{Event, EventHub, EventSink, TerminalEventSink};
pub use headers::{Headers, header_get, header_remove, header_set};
pub use provider::{
    CanonicalStream, CompletionRequest, ImageEditRequest, ProviderConfig, RawUpstreamRequest,
    StreamItem, UpstreamOutcome, UpstreamProvider,
};
pub use registry::ProviderRegistry;
