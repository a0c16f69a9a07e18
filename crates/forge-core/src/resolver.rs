//! The provider resolver (spec §4.1): `model` string + scope -> provider,
//! native model id, decoded credential, and the adapter that speaks its
//! dialect.

use std::collections::HashMap;
use std::sync::Arc;

use forge_cache::{CacheLayer, keys};
use forge_provider_core::{Credential, ProviderConfig, ProviderRegistry, UpstreamProvider};
use forge_storage::{CredentialRow, Store, TenantCredentialSet};

use crate::error::GatewayError;

pub struct ResolvedRoute {
    pub provider_name: String,
    pub native_model: String,
    pub credential: Credential,
    pub config: ProviderConfig,
    pub provider: Arc<dyn UpstreamProvider>,
    pub pk_id: i64,
    pub billable: bool,
}

/// Loads the tenant's active credentials, indexed by lowercase provider
/// name, going through `provider_keys:{tenant_id}` (1h TTL) first.
pub async fn load_tenant_credentials(
    tenant_id: i64,
    store: &dyn Store,
    cache: &CacheLayer,
) -> Result<HashMap<String, CredentialRow>, GatewayError> {
    let cache_key = keys::provider_keys(&tenant_id.to_string());
    let set = match cache.long.get::<TenantCredentialSet>(&cache_key).await {
        Ok(Some(set)) => set,
        _ => {
            let credentials = store
                .load_tenant_credentials(tenant_id)
                .await
                .map_err(|err| GatewayError::Internal(err.to_string()))?;
            let set = TenantCredentialSet { credentials };
            let _ = cache.long.set(&cache_key, &set, CacheLayer::LONG_TTL).await;
            set
        }
    };
    Ok(set
        .credentials
        .into_iter()
        .map(|row| (row.provider_name.to_lowercase(), row))
        .collect())
}

/// Resolves `model_string` against a tenant's credential set under the
/// client key's scope. `allowed_provider_credential_ids` empty means
/// unrestricted (spec §3 scope semantics).
pub async fn resolve(
    tenant_id: i64,
    model_string: &str,
    allowed_provider_credential_ids: &[i64],
    store: &dyn Store,
    cache: &CacheLayer,
    registry: &ProviderRegistry,
) -> Result<ResolvedRoute, GatewayError> {
    let credentials = load_tenant_credentials(tenant_id, store, cache).await?;

    let scoped = |row: &CredentialRow| -> bool {
        allowed_provider_credential_ids.is_empty()
            || allowed_provider_credential_ids.contains(&row.id)
    };
    let effective: HashMap<&str, &CredentialRow> = credentials
        .iter()
        .filter(|(_, row)| row.enabled && scoped(row))
        .map(|(name, row)| (name.as_str(), row))
        .collect();

    let (provider_name, native_model) = resolve_name(model_string, &effective)?;
    let Some(row) = effective.get(provider_name.as_str()) else {
        return Err(GatewayError::ScopeDenied(format!(
            "client key is not scoped to provider '{provider_name}'"
        )));
    };
    let row = (*row).clone();

    let provider = registry
        .get(&provider_name)
        .ok_or_else(|| GatewayError::InvalidProvider(format!("unknown provider '{provider_name}'")))?;

    let credential = provider
        .deserialize_credential(&row.ciphertext)
        .map_err(GatewayError::from)?;

    let config = ProviderConfig {
        base_url: row.base_url.clone(),
        model_name_map: row.model_name_map.clone(),
        billable: row.billable,
        extra_headers: Vec::new(),
    };

    Ok(ResolvedRoute {
        provider_name,
        native_model,
        credential,
        config,
        provider,
        pk_id: row.id,
        billable: row.billable,
    })
}

/// Implements the prefixed/unprefixed split of §4.1 step 3. Returns
/// `(provider_name, native_model)`.
fn resolve_name(
    model_string: &str,
    effective: &HashMap<&str, &CredentialRow>,
) -> Result<(String, String), GatewayError> {
    let parts: Vec<&str> = model_string.split('/').collect();

    // A bare, slash-free string that happens to equal a provider name is
    // *not* a prefixed match (spec §4.1): it falls through to the
    // unprefixed search below instead of resolving to "provider with an
    // empty native model".
    if parts.len() > 1 {
        // Iterating longest-to-shortest already encodes the "longest
        // matching prefix wins" tie-break.
        for i in (1..parts.len()).rev() {
            let candidate = parts[..i].join("/");
            if let Some((name, _)) = effective
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&candidate))
            {
                let native = parts[i..].join("/");
                let row = effective[name];
                let remapped = row
                    .model_name_map
                    .get(&native)
                    .cloned()
                    .unwrap_or(native);
                return Ok((name.to_string(), remapped));
            }
        }
    }

    // Unprefixed fallback: providers whose name is a substring of the
    // model string are tried first (tenants alias native ids directly).
    let mut candidates: Vec<&&str> = effective.keys().collect();
    candidates.sort_by_key(|name| !model_string.contains(*name));
    for name in candidates {
        let row = effective[name];
        if let Some(native) = row.model_name_map.get(model_string) {
            return Ok((name.to_string(), native.clone()));
        }
    }

    Err(GatewayError::InvalidProvider(format!(
        "could not resolve model '{model_string}' to any allowed provider"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn row(id: i64, provider: &str, map: &[(&str, &str)]) -> CredentialRow {
        CredentialRow {
            id,
            tenant_id: 1,
            provider_name: provider.to_string(),
            ciphertext: "{}".to_string(),
            base_url: None,
            model_name_map: map.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            billable: false,
            enabled: true,
        }
    }

    #[test]
    fn prefixed_form_resolves_longest_prefix() {
        let openai = row(1, "openai", &[]);
        let custom = row(2, "openai-custom", &[]);
        let mut effective: Map<&str, &CredentialRow> = Map::new();
        effective.insert("openai", &openai);
        effective.insert("openai-custom", &custom);

        let (name, native) = resolve_name("openai-custom/foo", &effective).unwrap();
        assert_eq!(name, "openai-custom");
        assert_eq!(native, "foo");
    }

    #[test]
    fn unprefixed_form_uses_model_name_map() {
        let openai = row(1, "openai", &[("gpt-4o-mini", "gpt-4o-mini-2024")]);
        let mut effective: Map<&str, &CredentialRow> = Map::new();
        effective.insert("openai", &openai);

        let (name, native) = resolve_name("gpt-4o-mini", &effective).unwrap();
        assert_eq!(name, "openai");
        assert_eq!(native, "gpt-4o-mini-2024");
    }

    #[test]
    fn whole_string_matching_provider_name_is_unprefixed() {
        // "openai" has no '/': it must fall through to the unprefixed
        // search rather than resolve with an empty native model.
        let openai = row(1, "openai", &[("openai", "openai-native")]);
        let mut effective: Map<&str, &CredentialRow> = Map::new();
        effective.insert("openai", &openai);

        let (name, native) = resolve_name("openai", &effective).unwrap();
        assert_eq!(name, "openai");
        assert_eq!(native, "openai-native");
    }

    #[test]
    fn unresolvable_model_is_invalid_provider() {
        let effective: Map<&str, &CredentialRow> = Map::new();
        let err = resolve_name("nonexistent/foo", &effective).unwrap_err();
        assert_eq!(err.code(), "invalid_provider");
    }
}
