//! Client-key authentication (spec §6: `Authorization: Bearer forge-{hex}`
//! or `X-API-KEY: forge-{hex}`).
//!
//! Resolution goes through the `user:{secret}` scope cache first; a miss
//! falls through to the store and repopulates the cache with a 5-minute
//! TTL (`CacheLayer::SCOPE_TTL`), matching the user/credential/scope cache
//! described in §4.4. The taxonomy in §7 has no dedicated code for "bad
//! client key" — this module surfaces it as `scope_denied` (401), the
//! nearest taxonomy entry for an authorization-layer rejection.

use axum::http::HeaderMap;
use forge_cache::{CacheLayer, keys};
use forge_storage::{ClientKeyRow, Store};
use time::OffsetDateTime;

use crate::error::GatewayError;

const FORGE_PREFIX: &str = "forge-";
const SECRET_HEX_LEN: usize = 36;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub tenant_id: i64,
    pub key_id: i64,
    /// Secret with the `forge-` prefix stripped; used to key
    /// `forge_scope:{secret_no_prefix}` when scope lookups are cached
    /// separately from the key-identity lookup.
    pub secret_no_prefix: String,
    pub allowed_provider_credential_ids: Vec<i64>,
}

pub async fn authenticate(
    headers: &HeaderMap,
    store: &dyn Store,
    cache: &CacheLayer,
) -> Result<AuthContext, GatewayError> {
    let secret = extract_api_key(headers)
        .ok_or_else(|| GatewayError::ScopeDenied("missing api key".to_string()))?;
    let secret_no_prefix = validate_key_format(&secret)?;

    let cache_key = keys::user(&secret);
    let row = match cache.scope.get::<ClientKeyRow>(&cache_key).await {
        Ok(Some(row)) => row,
        _ => {
            let secret_hash = blake3::hash(secret.as_bytes()).to_hex().to_string();
            let row = store
                .load_client_key_by_secret_hash(&secret_hash)
                .await
                .map_err(|err| GatewayError::Internal(err.to_string()))?
                .ok_or_else(|| GatewayError::ScopeDenied("invalid api key".to_string()))?;
            let _ = cache
                .scope
                .set(&cache_key, &row, CacheLayer::SCOPE_TTL)
                .await;
            row
        }
    };

    if !row.active {
        return Err(GatewayError::ScopeDenied("api key disabled".to_string()));
    }

    let _ = store.touch_client_key_last_used(row.id, OffsetDateTime::now_utc()).await;

    Ok(AuthContext {
        tenant_id: row.tenant_id,
        key_id: row.id,
        secret_no_prefix,
        allowed_provider_credential_ids: row.allowed_provider_credential_ids,
    })
}

/// Strips the `forge-` prefix and checks the key is 36 lowercase-or-uppercase
/// hex characters (18 random bytes, per §6).
fn validate_key_format(secret: &str) -> Result<String, GatewayError> {
    let rest = secret
        .strip_prefix(FORGE_PREFIX)
        .ok_or_else(|| GatewayError::ScopeDenied("malformed api key".to_string()))?;
    if rest.len() != SECRET_HEX_LEN || !rest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GatewayError::ScopeDenied("malformed api key".to_string()));
    }
    Ok(rest.to_string())
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = header_value(headers, "x-api-key") {
        return Some(value);
    }

    let auth = header_value(headers, "authorization")?;
    let auth = auth.trim();
    if let Some(token) = auth.strip_prefix("Bearer ") {
        return Some(token.trim().to_string());
    }
    if let Some(token) = auth.strip_prefix("bearer ") {
        return Some(token.trim().to_string());
    }
    None
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_secret() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer forge-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
        );
        assert_eq!(
            extract_api_key(&headers).as_deref(),
            Some("forge-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
    }

    #[test]
    fn extracts_x_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_static("forge-bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
        );
        assert_eq!(
            extract_api_key(&headers).as_deref(),
            Some("forge-bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
        );
    }

    #[test]
    fn rejects_non_hex_key_body() {
        let err = validate_key_format("forge-not-hex-at-all").unwrap_err();
        assert_eq!(err.code(), "scope_denied");
    }

    #[test]
    fn strips_prefix_on_valid_key() {
        let hex = "c".repeat(SECRET_HEX_LEN);
        let secret = format!("{FORGE_PREFIX}{hex}");
        assert_eq!(validate_key_format(&secret).unwrap(), hex);
    }
}
