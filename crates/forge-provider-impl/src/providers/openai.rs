//! Generic adapter for the OpenAI chat-completions wire shape, reused
//! verbatim for every OpenAI-compatible vendor in the family: the request
//! and response bodies already match the canonical dialect byte-for-byte,
//! so translation is limited to model-name remapping and auth.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use forge_provider_core::{
    CompletionRequest, Credential, ProviderConfig, ProviderError, ProviderResult, UpstreamOutcome,
    UpstreamProvider,
};

use crate::client::shared_client;
use crate::sse_bridge::spawn_sse_bridge;
use crate::validate::validate_chat_request;

/// One struct, many vendors (spec §4.2 "OpenAI family"): fireworks,
/// together, groq, mistral, perplexity, deepinfra, openrouter, alibaba,
/// moonshot, nvidia, deepseek, tensorblock and plain OpenAI itself are all
/// instances of this adapter, differing only in name and default host.
pub struct OpenAICompatProvider {
    name: &'static str,
    default_base_url: &'static str,
}

impl OpenAICompatProvider {
    pub const fn new(name: &'static str, default_base_url: &'static str) -> Self {
        Self {
            name,
            default_base_url,
        }
    }
}

fn api_key(credential: &Credential) -> ProviderResult<&str> {
    match credential {
        Credential::ApiKey { api_key } => Ok(api_key.as_str()),
        _ => Err(ProviderError::InvalidSetup(
            "expected an api_key credential".to_string(),
        )),
    }
}

#[async_trait]
impl UpstreamProvider for OpenAICompatProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn default_base_url(&self) -> &'static str {
        self.default_base_url
    }

    fn list_models_cache_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn list_models(
        &self,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<Vec<String>> {
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url);
        let url = format!("{}/models", base_url.trim_end_matches('/'));
        let client = shared_client(None)?;
        let request = apply_auth(client.get(&url), api_key(credential)?, config);
        let response = raise_for_status(request.send().await?).await?;
        let body: forge_protocol::openai::list_models::response::ListModelsResponse =
            response.json().await?;
        Ok(body.data.into_iter().map(|model| model.id).collect())
    }

    async fn process_completion(
        &self,
        request: CompletionRequest,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<UpstreamOutcome> {
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url);
        let (path, is_stream, mut body) = match request {
            CompletionRequest::Chat(body) => {
                validate_chat_request(&body)?;
                let is_stream = body.stream.unwrap_or(false);
                let value = serde_json::to_value(body)
                    .map_err(|err| ProviderError::Other(err.to_string()))?;
                ("/chat/completions", is_stream, value)
            }
            CompletionRequest::Text(body) => {
                let is_stream = body.stream.unwrap_or(false);
                let value = serde_json::to_value(body)
                    .map_err(|err| ProviderError::Other(err.to_string()))?;
                ("/completions", is_stream, value)
            }
        };
        if let Some(model) = body.get("model").and_then(|v| v.as_str()).map(str::to_string) {
            body["model"] = JsonValue::String(config.remap_model(&model));
        }

        let url = format!("{}{path}", base_url.trim_end_matches('/'));
        let client = shared_client(None)?;
        let request = apply_auth(client.post(&url).json(&body), api_key(credential)?, config);
        let response = raise_for_status(request.send().await?).await?;

        if is_stream {
            Ok(UpstreamOutcome::Stream(spawn_sse_bridge(
                response,
                |data| {
                    serde_json::from_str::<JsonValue>(data)
                        .map(|value| vec![value])
                        .map_err(|err| err.to_string())
                },
            )))
        } else {
            Ok(UpstreamOutcome::Unary(response.json().await?))
        }
    }

    async fn process_embeddings(
        &self,
        request: forge_protocol::openai::embeddings::request::CreateEmbeddingRequestBody,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<JsonValue> {
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url);
        let url = format!("{}/embeddings", base_url.trim_end_matches('/'));
        let client = shared_client(None)?;
        let request = apply_auth(
            client.post(&url).json(&request),
            api_key(credential)?,
            config,
        );
        let response = raise_for_status(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

fn apply_auth(
    request: reqwest::RequestBuilder,
    api_key: &str,
    config: &ProviderConfig,
) -> reqwest::RequestBuilder {
    let mut request = request.bearer_auth(api_key);
    for (name, value) in &config.extra_headers {
        request = request.header(name, value);
    }
    request
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
