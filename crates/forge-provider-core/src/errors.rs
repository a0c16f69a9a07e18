use std::fmt;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors an adapter can raise. These map onto a subset of the gateway-wide
/// error taxonomy (`forge-core::error::GatewayError`); this crate does not
/// depend on `forge-core`, so the mapping happens at the call site.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Endpoint not supported by this provider (e.g. embeddings on Anthropic).
    NotImplemented(&'static str),
    /// Canonical payload violates a cross-field constraint the adapter checks.
    InvalidRequest(String),
    /// Stored credential/config failed a pre-flight construction check.
    InvalidSetup(String),
    /// Upstream rejected the credential.
    AuthFailed(String),
    /// Upstream returned a non-2xx response.
    UpstreamApiError { status: u16, message: String },
    /// Network/transport failure talking to the upstream.
    Transport(String),
    Other(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::NotImplemented(what) => write!(f, "not implemented: {what}"),
            ProviderError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            ProviderError::InvalidSetup(msg) => write!(f, "invalid provider setup: {msg}"),
            ProviderError::AuthFailed(msg) => write!(f, "provider auth failed: {msg}"),
            ProviderError::UpstreamApiError { status, message } => {
                write!(f, "upstream error ({status}): {message}")
            }
            ProviderError::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}
