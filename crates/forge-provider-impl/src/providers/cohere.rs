//! Cohere adapter. Covers the v2 chat API (near-identical to the OpenAI
//! shape once the path changes) and embeddings, whose request/response
//! shapes diverge enough from the canonical dialect to need real
//! translation: `{input, model}` becomes `{texts, model, input_type,
//! embedding_types}`, and the reshaped response pulls its billed token
//! count out of `meta.billed_units` rather than a `usage` object.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use forge_provider_core::{
    CompletionRequest, Credential, ProviderConfig, ProviderError, ProviderResult, UpstreamOutcome,
    UpstreamProvider,
};

use crate::client::shared_client;
use crate::sse_bridge::spawn_sse_bridge;

#[derive(Debug, Default)]
pub struct CohereProvider;

impl CohereProvider {
    pub fn new() -> Self {
        Self
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
impl UpstreamProvider for CohereProvider {
    fn name(&self) -> &'static str {
        "cohere"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.cohere.com"
    }

    fn list_models_cache_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn list_models(
        &self,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<Vec<String>> {
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let url = format!("{}/v1/models", base_url.trim_end_matches('/'));
        let client = shared_client(None)?;
        let response =
            raise_for_status(client.get(&url).bearer_auth(api_key(credential)?).send().await?)
                .await?;
        let body: JsonValue = response.json().await?;
        let models = body
            .get("models")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|model| model.get("name").and_then(|n| n.as_str()))
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
                "legacy text completions are not supported by the cohere adapter",
            ));
        };
        let is_stream = body.stream.unwrap_or(false);
        let model = config.remap_model(&body.model);
        let mut value =
            serde_json::to_value(body).map_err(|err| ProviderError::Other(err.to_string()))?;
        value["model"] = JsonValue::String(model.clone());

        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let url = format!("{}/v2/chat", base_url.trim_end_matches('/'));
        let client = shared_client(None)?;
        let response = raise_for_status(
            client
                .post(&url)
                .bearer_auth(api_key(credential)?)
                .json(&value)
                .send()
                .await?,
        )
        .await?;

        if is_stream {
            Ok(UpstreamOutcome::Stream(spawn_sse_bridge(response, |data| {
                serde_json::from_str::<JsonValue>(data)
                    .map(|value| vec![value])
                    .map_err(|err| err.to_string())
            })))
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
        let model = config.remap_model(&request.model);
        let texts = match &request.input {
            forge_protocol::openai::embeddings::types::EmbeddingInput::Single(text) => {
                vec![text.clone()]
            }
            forge_protocol::openai::embeddings::types::EmbeddingInput::Many(texts) => texts.clone(),
            forge_protocol::openai::embeddings::types::EmbeddingInput::Tokens(_)
            | forge_protocol::openai::embeddings::types::EmbeddingInput::TokenBatches(_) => {
                return Err(ProviderError::InvalidRequest(
                    "cohere does not accept pre-tokenized embedding input".to_string(),
                ));
            }
        };
        let native_body = serde_json::json!({
            "texts": texts,
            "model": model,
            "input_type": "search_document",
            "embedding_types": ["float"],
        });

        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let url = format!("{}/v1/embed", base_url.trim_end_matches('/'));
        let client = shared_client(None)?;
        let response = raise_for_status(
            client
                .post(&url)
                .bearer_auth(api_key(credential)?)
                .json(&native_body)
                .send()
                .await?,
        )
        .await?;
        let native: JsonValue = response.json().await?;
        Ok(cohere_embed_response_to_openai(&native, &model))
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

fn cohere_embed_response_to_openai(native: &JsonValue, model: &str) -> JsonValue {
    let floats = native
        .pointer("/embeddings/float")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let data: Vec<JsonValue> = floats
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| {
            serde_json::json!({
                "object": "embedding",
                "embedding": embedding,
                "index": index,
            })
        })
        .collect();
    let billed_tokens = native
        .pointer("/meta/billed_units/input_tokens")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    serde_json::json!({
        "object": "list",
        "data": data,
        "model": model,
        "usage": {
            "prompt_tokens": billed_tokens,
            "total_tokens": billed_tokens,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reshapes_embed_response_into_openai_list() {
        let native = serde_json::json!({
            "embeddings": { "float": [[0.1, 0.2], [0.3, 0.4]] },
            "meta": { "billed_units": { "input_tokens": 7 } },
        });
        let reshaped = cohere_embed_response_to_openai(&native, "embed-english-v3.0");
        assert_eq!(reshaped["data"].as_array().unwrap().len(), 2);
        assert_eq!(reshaped["data"][1]["index"], 1);
        assert_eq!(reshaped["usage"]["prompt_tokens"], 7);
    }
}
