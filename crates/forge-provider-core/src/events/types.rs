use time::OffsetDateTime;

use serde::{Deserialize, Serialize};

/// Structured operational events the gateway fans out alongside `tracing`
/// logs: credential-level availability changes an operator dashboard or
/// alert would want, independent of the per-request log stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CredentialUnavailable {
        at: OffsetDateTime,
        pk_id: i64,
        provider: String,
        reason: String,
    },
    CredentialRecovered {
        at: OffsetDateTime,
        pk_id: i64,
        provider: String,
    },
    WalletBlocked {
        at: OffsetDateTime,
        tenant_id: String,
    },
}
