//! Gateway-wide error taxonomy (§7) and its HTTP projection.
//!
//! Every fallible path in this crate converges on `GatewayError`; handlers
//! turn it into the canonical unary error envelope `{"detail": "..."}` with
//! the matching HTTP status. Mid-stream failures never go through this type
//! — they're rendered in-band by the streaming bridge instead.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forge_provider_core::ProviderError;
use serde::Serialize;

#[derive(Debug, Clone)]
pub enum GatewayError {
    InvalidRequest(String),
    InvalidProvider(String),
    ProviderAuthFailed { status: u16, message: String },
    InvalidProviderSetup(String),
    ScopeDenied(String),
    ProviderApiError { status: u16, message: String },
    PaymentRequired(String),
    NotImplemented(String),
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_)
            | GatewayError::InvalidProvider(_)
            | GatewayError::InvalidProviderSetup(_) => StatusCode::BAD_REQUEST,
            GatewayError::ProviderAuthFailed { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::UNAUTHORIZED)
            }
            GatewayError::ScopeDenied(_) => StatusCode::UNAUTHORIZED,
            GatewayError::ProviderApiError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            GatewayError::NotImplemented(_) => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            GatewayError::InvalidRequest(msg)
            | GatewayError::InvalidProvider(msg)
            | GatewayError::InvalidProviderSetup(msg)
            | GatewayError::ScopeDenied(msg)
            | GatewayError::PaymentRequired(msg)
            | GatewayError::NotImplemented(msg)
            | GatewayError::Internal(msg) => msg.clone(),
            GatewayError::ProviderAuthFailed { message, .. }
            | GatewayError::ProviderApiError { message, .. } => message.clone(),
        }
    }

    /// Internal error code name, used as the `StreamItem::Error` code when a
    /// pre-commit failure becomes post-commit in the same call.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::InvalidProvider(_) => "invalid_provider",
            GatewayError::ProviderAuthFailed { .. } => "provider_auth_failed",
            GatewayError::InvalidProviderSetup(_) => "invalid_provider_setup",
            GatewayError::ScopeDenied(_) => "scope_denied",
            GatewayError::ProviderApiError { .. } => "provider_api_error",
            GatewayError::PaymentRequired(_) => "payment_required",
            GatewayError::NotImplemented(_) => "not_implemented",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotImplemented(what) => GatewayError::NotImplemented(what.to_string()),
            ProviderError::InvalidRequest(msg) => GatewayError::InvalidRequest(msg),
            ProviderError::InvalidSetup(msg) => GatewayError::InvalidProviderSetup(msg),
            ProviderError::AuthFailed(msg) => GatewayError::ProviderAuthFailed { status: 401, message: msg },
            ProviderError::UpstreamApiError { status, message } => {
                GatewayError::ProviderApiError { status, message }
            }
            ProviderError::Transport(msg) => GatewayError::ProviderApiError { status: 502, message: msg },
            ProviderError::Other(msg) => GatewayError::Internal(msg),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();
        (status, Json(ErrorBody { detail })).into_response()
    }
}
