//! Anthropic-on-Vertex adapter (spec §4.2 "Vertex Anthropic-on-Vertex").
//! Authenticates with a service-account JWT exchanged for a short-lived
//! OAuth2 access token (cached until near expiry) instead of a static API
//! key, then speaks the same Anthropic Messages wire shape as the direct
//! Anthropic adapter via `rawPredict`/`streamRawPredict`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use forge_provider_core::{
    CompletionRequest, Credential, ProviderConfig, ProviderError, ProviderResult, UpstreamOutcome,
    UpstreamProvider,
};

use super::anthropic::{AnthropicStreamState, anthropic_message_to_openai, openai_chat_to_anthropic};
use crate::client::shared_client;
use crate::sse_bridge::spawn_sse_bridge;

const OAUTH_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ANTHROPIC_VERTEX_VERSION: &str = "vertex-2023-10-16";

#[derive(Debug, Default)]
pub struct VertexProvider;

impl VertexProvider {
    pub fn new() -> Self {
        Self
    }
}

fn service_account(credential: &Credential) -> ProviderResult<(&str, &str, &str)> {
    match credential {
        Credential::Vertex {
            service_account_json,
            project,
            location,
            ..
        } => Ok((service_account_json.as_str(), project.as_str(), location.as_str())),
        _ => Err(ProviderError::InvalidSetup(
            "expected a vertex service-account credential".to_string(),
        )),
    }
}

#[async_trait]
impl UpstreamProvider for VertexProvider {
    fn name(&self) -> &'static str {
        "vertex"
    }

    fn default_base_url(&self) -> &'static str {
        "https://aiplatform.googleapis.com"
    }

    fn list_models_cache_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn list_models(
        &self,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<Vec<String>> {
        let (sa_json, project, location) = service_account(credential)?;
        let access_token = fetch_access_token(sa_json).await?;
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let url = format!(
            "{}/v1/projects/{project}/locations/{location}/publishers/anthropic/models",
            base_url.trim_end_matches('/')
        );
        let client = shared_client(None)?;
        let response =
            raise_for_status(client.get(&url).bearer_auth(&access_token).send().await?).await?;
        let body: JsonValue = response.json().await?;
        let models = body
            .get("publisherModels")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|model| model.get("name").and_then(|n| n.as_str()))
            .filter_map(|name| name.rsplit('/').next())
            .map(str::to_string)
            .collect();
        Ok(models)
    }

    async fn process_completion(
        &self,
        request: CompletionRequest,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<UpstreamOutcome> {
        let CompletionRequest::Chat(body) = request else {
            return Err(ProviderError::NotImplemented(
                "legacy text completions are not supported by the vertex adapter",
            ));
        };
        let is_stream = body.stream.unwrap_or(false);
        let model = config.remap_model(&body.model);
        let mut native_body = openai_chat_to_anthropic(&body, &model)?;
        if let JsonValue::Object(map) = &mut native_body {
            map.remove("model");
            map.insert(
                "anthropic_version".to_string(),
                JsonValue::String(ANTHROPIC_VERTEX_VERSION.to_string()),
            );
        }

        let (sa_json, project, location) = service_account(credential)?;
        let access_token = fetch_access_token(sa_json).await?;
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let method = if is_stream {
            "streamRawPredict"
        } else {
            "rawPredict"
        };
        let url = format!(
            "{}/v1/projects/{project}/locations/{location}/publishers/anthropic/models/{model}:{method}",
            base_url.trim_end_matches('/')
        );

        let client = shared_client(None)?;
        let response = raise_for_status(
            client
                .post(&url)
                .bearer_auth(&access_token)
                .json(&native_body)
                .send()
                .await?,
        )
        .await?;

        if is_stream {
            let mut state = AnthropicStreamState::new(model.clone());
            Ok(UpstreamOutcome::Stream(spawn_sse_bridge(
                response,
                move |data| state.translate_event(data),
            )))
        } else {
            let native: JsonValue = response.json().await?;
            Ok(UpstreamOutcome::Unary(anthropic_message_to_openai(
                &native, &model,
            )))
        }
    }
}

async fn raise_for_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::UpstreamApiError {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    private_key_id: String,
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

fn token_cache() -> &'static Mutex<HashMap<String, (String, i64)>> {
    static CACHE: OnceLock<Mutex<HashMap<String, (String, i64)>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Exchanges a service-account key for a bearer token, reusing a cached
/// token until it is within 300s (5 minutes) of expiry (spec §4.2: Vertex
/// credentials carry a refreshable token rather than a static secret).
async fn fetch_access_token(service_account_json: &str) -> ProviderResult<String> {
    let sa: ServiceAccountKey = serde_json::from_str(service_account_json)
        .map_err(|err| ProviderError::InvalidSetup(format!("invalid vertex service account: {err}")))?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| ProviderError::Other(err.to_string()))?
        .as_secs() as i64;

    if let Some((token, expires_at)) = token_cache()
        .lock()
        .map_err(|_| ProviderError::Other("vertex token cache poisoned".to_string()))?
        .get(&sa.client_email)
        && now + 300 < *expires_at
    {
        return Ok(token.clone());
    }

    let exp = now + 3600;
    let claims = JwtClaims {
        iss: &sa.client_email,
        scope: OAUTH_SCOPE,
        aud: TOKEN_URI,
        exp,
        iat: now,
    };
    let mut header = Header::new(Algorithm::RS256);
    if !sa.private_key_id.is_empty() {
        header.kid = Some(sa.private_key_id.clone());
    }
    let key = EncodingKey::from_rsa_pem(sa.private_key.as_bytes())
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    let jwt = jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    let body = format!(
        "grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer&assertion={}",
        urlencoding::encode(&jwt)
    );

    let client = shared_client(None)?;
    let response = client
        .post(TOKEN_URI)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await?;
    let response = raise_for_status(response).await?;
    let token_response: OAuthTokenResponse = response.json().await?;
    let expires_at = now + token_response.expires_in.unwrap_or(3600);

    token_cache()
        .lock()
        .map_err(|_| ProviderError::Other("vertex token cache poisoned".to_string()))?
        .insert(sa.client_email, (token_response.access_token.clone(), expires_at));
    Ok(token_response.access_token)
}
