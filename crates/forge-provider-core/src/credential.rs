//! Opaque upstream credentials.
//!
//! A credential is always handled as an opaque blob outside the adapter
//! that owns its shape (spec §9, "Credential opacity"). Multi-field
//! providers (Azure, Bedrock, Vertex) pack several secrets into one
//! structured encoding; `serialize_credential`/`deserialize_credential`
//! on `UpstreamProvider` are the only sanctioned way in or out of that
//! encoding.

use serde::{Deserialize, Serialize};

/// The decoded shape of a stored credential. Adapters deserialize the
/// tenant's ciphertext-derived plaintext into the variant they expect and
/// never interpret another variant's fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    /// A single bearer/header secret, used by the entire OpenAI-compatible
    /// family, Anthropic, Google AI Studio, and Cohere.
    ApiKey { api_key: String },
    /// Azure OpenAI: api key plus the deployment-scoped API version.
    Azure { api_key: String, api_version: String },
    /// AWS Bedrock: the SigV4 triple.
    Bedrock {
        region: String,
        access_key_id: String,
        secret_access_key: String,
    },
    /// Anthropic-on-Vertex: a GCP service-account JSON document plus the
    /// publisher/location/project routing fields.
    Vertex {
        service_account_json: String,
        project: String,
        location: String,
        #[serde(default = "default_vertex_publisher")]
        publisher: String,
    },
}

fn default_vertex_publisher() -> String {
    "anthropic".to_string()
}

/// Masks every string-valued secret field of a serialized credential,
/// keeping at most the first 2 and last 4 characters of each value and
/// asterisking the rest (spec §3, §9 "Credential masking helper").
pub fn mask_credential(credential: &Credential) -> String {
    match credential {
        Credential::ApiKey { api_key } => mask_secret(api_key),
        Credential::Azure { api_key, api_version } => {
            format!("{} (api-version {api_version})", mask_secret(api_key))
        }
        Credential::Bedrock {
            region,
            access_key_id,
            secret_access_key,
        } => format!(
            "{region}: {}/{}",
            mask_secret(access_key_id),
            mask_secret(secret_access_key)
        ),
        Credential::Vertex {
            project, location, publisher, ..
        } => format!("{publisher}@{project}/{location} (service-account redacted)"),
    }
}

pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let prefix: String = chars[..2].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    let masked = "*".repeat(chars.len() - 6);
    format!("{prefix}{masked}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_reveals_at_most_prefix_and_suffix() {
        let masked = mask_secret("sk-abcdefghijklmnop");
        assert!(masked.starts_with("sk"));
        assert!(masked.ends_with("mnop"));
        assert!(!masked.contains("cdefghijkl"));
    }

    #[test]
    fn mask_short_secret_is_fully_redacted() {
        assert_eq!(mask_secret("abc"), "***");
    }
}
