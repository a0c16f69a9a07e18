//! Plain value copies of the rows the resolver needs, loaded once per
//! cache miss and handed to `forge-cache` as an opaque serializable value
//! — never a live `sea_orm` model.

use std::collections::HashMap;

use forge_common::GlobalConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct GlobalConfigRow {
    pub id: i64,
    pub config: GlobalConfig,
    pub updated_at: OffsetDateTime,
}

/// One tenant's stored secret for a single provider, with its scope
/// association already folded in (`allowed_key_ids` empty means every
/// client key of the tenant may use it, matching the "no scope rows"
/// invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRow {
    pub id: i64,
    pub tenant_id: i64,
    pub provider_name: String,
    pub ciphertext: String,
    pub base_url: Option<String>,
    pub model_name_map: HashMap<String, String>,
    pub billable: bool,
    pub enabled: bool,
}

/// The full set of a tenant's active credentials, cached under
/// `provider_keys:{tenant_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TenantCredentialSet {
    pub credentials: Vec<CredentialRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientKeyRow {
    pub id: i64,
    pub tenant_id: i64,
    pub active: bool,
    /// Provider credential ids this key is scoped to; empty means
    /// unrestricted.
    pub allowed_provider_credential_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct WalletRow {
    pub tenant_id: i64,
    pub balance: Decimal,
    pub blocked: bool,
    pub version: i64,
}

#[derive(Debug, Clone)]
pub struct StorageSnapshot {
    pub global_config: Option<GlobalConfigRow>,
    pub credentials: Vec<CredentialRow>,
}

pub fn model_name_map_from_json(value: &JsonValue) -> HashMap<String, String> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
