//! Azure OpenAI adapter. Deployment name travels in the URL path (taken
//! from the canonical `model` field), the API version is a query
//! parameter rather than part of the path, and the credential header is
//! `api-key` instead of `Authorization: Bearer`.

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
pub struct AzureProvider;

impl AzureProvider {
    pub fn new() -> Self {
        Self
    }
}

fn azure_credential(credential: &Credential) -> ProviderResult<(&str, &str)> {
    match credential {
        Credential::Azure { api_key, api_version } => Ok((api_key.as_str(), api_version.as_str())),
        _ => Err(ProviderError::InvalidSetup(
            "expected an azure credential".to_string(),
        )),
    }
}

#[async_trait]
impl UpstreamProvider for AzureProvider {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn default_base_url(&self) -> &'static str {
        "https://your-resource.openai.azure.com"
    }

    fn list_models_cache_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn list_models(
        &self,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<Vec<String>> {
        let (api_key, api_version) = azure_credential(credential)?;
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let url = format!(
            "{}/openai/deployments?api-version={api_version}",
            base_url.trim_end_matches('/')
        );
        let client = shared_client(None)?;
        let response = raise_for_status(client.get(&url).header("api-key", api_key).send().await?).await?;
        let body: JsonValue = response.json().await?;
        let models = body
            .get("data")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|deployment| deployment.get("id").and_then(|id| id.as_str()))
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
        let (api_key, api_version) = azure_credential(credential)?;
        let (path_kind, is_stream, mut body, model) = match request {
            CompletionRequest::Chat(body) => {
                let is_stream = body.stream.unwrap_or(false);
                let model = config.remap_model(&body.model);
                let value = serde_json::to_value(body)
                    .map_err(|err| ProviderError::Other(err.to_string()))?;
                ("chat/completions", is_stream, value, model)
            }
            CompletionRequest::Text(body) => {
                let is_stream = body.stream.unwrap_or(false);
                let model = config.remap_model(&body.model);
                let value = serde_json::to_value(body)
                    .map_err(|err| ProviderError::Other(err.to_string()))?;
                ("completions", is_stream, value, model)
            }
        };
        // Azure routes by deployment name in the path; the deployment name
        // *is* the (possibly remapped) model.
        body["model"] = JsonValue::String(model.clone());

        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let url = format!(
            "{}/openai/deployments/{model}/{path_kind}?api-version={api_version}",
            base_url.trim_end_matches('/')
        );
        let client = shared_client(None)?;
        let response = raise_for_status(
            client
                .post(&url)
                .header("api-key", api_key)
                .json(&body)
                .send()
                .await?,
        )
        .await?;

        if is_stream {
            Ok(UpstreamOutcome::Stream(spawn_sse_bridge(response, |data| {
                let mut value: JsonValue = serde_json::from_str(data).map_err(|err| err.to_string())?;
                // Azure occasionally emits a chunk with `choices: []`; give
                // canonical consumers a single empty-delta choice instead.
                if value
                    .get("choices")
                    .and_then(|c| c.as_array())
                    .map(|c| c.is_empty())
                    .unwrap_or(false)
                {
                    value["choices"] = serde_json::json!([{
                        "index": 0,
                        "delta": {},
                        "finish_reason": JsonValue::Null,
                    }]);
                }
                Ok(vec![value])
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
        let (api_key, api_version) = azure_credential(credential)?;
        let model = config.remap_model(&request.model);
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let url = format!(
            "{}/openai/deployments/{model}/embeddings?api-version={api_version}",
            base_url.trim_end_matches('/')
        );
        let client = shared_client(None)?;
        let response = raise_for_status(
            client
                .post(&url)
                .header("api-key", api_key)
                .json(&request)
                .send()
                .await?,
        )
        .await?;
        Ok(response.json().await?)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_azure_credential() {
        let cred = Credential::ApiKey {
            api_key: "sk-test".to_string(),
        };
        assert!(azure_credential(&cred).is_err());
    }
}
