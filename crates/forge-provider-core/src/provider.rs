//! The adapter contract (spec §4.2) and the canonical request/response
//! shapes adapters exchange with the dispatch layer.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value as JsonValue;

use forge_protocol::openai::chat_completions::request::CreateChatCompletionRequestBody;
use forge_protocol::openai::completions::request::CreateCompletionRequestBody;
use forge_protocol::openai::embeddings::request::CreateEmbeddingRequestBody;
use forge_protocol::openai::images::request::{CreateImageEditRequestBody, CreateImageRequestBody};

use crate::credential::Credential;
use crate::errors::ProviderResult;

/// Per-credential configuration a tenant can override (spec §3
/// `Provider credential`: `base_url`, `model_name_map`, `billable`).
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub model_name_map: HashMap<String, String>,
    pub billable: bool,
    pub extra_headers: Vec<(String, String)>,
}

impl ProviderConfig {
    /// Applies the credential's `model_name_map` (canonical -> native),
    /// falling back to the input unchanged when there is no mapping.
    pub fn remap_model(&self, native_model: &str) -> String {
        self.model_name_map
            .get(native_model)
            .cloned()
            .unwrap_or_else(|| native_model.to_string())
    }
}

/// The "endpoint kind" dispatched to `process_completion`: either the chat
/// or the legacy text-completions shape. Kept as one call so adapters that
/// treat both identically (the OpenAI family) do not need two entry points.
#[derive(Debug, Clone)]
pub enum CompletionRequest {
    Chat(CreateChatCompletionRequestBody),
    Text(CreateCompletionRequestBody),
}

impl CompletionRequest {
    pub fn is_stream(&self) -> bool {
        match self {
            CompletionRequest::Chat(body) => body.stream.unwrap_or(false),
            CompletionRequest::Text(body) => body.stream.unwrap_or(false),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            CompletionRequest::Chat(body) => &body.model,
            CompletionRequest::Text(body) => &body.model,
        }
    }
}

/// One frame of a canonical stream, already shaped like a
/// `chat.completion.chunk` JSON object (or, for text completions, a
/// `text_completion` chunk). The streaming bridge (`forge-core`) only
/// needs to serialize these as `data: {json}\n\n`; all dialect
/// translation happens in the adapter that produced them.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Chunk(JsonValue),
    /// Upstream failed after the response status was already committed;
    /// the bridge renders this as the in-band SSE error event (spec §4.3).
    Error { message: String, code: &'static str },
}

pub type CanonicalStream = tokio::sync::mpsc::Receiver<StreamItem>;

#[derive(Debug)]
pub enum UpstreamOutcome {
    Unary(JsonValue),
    Stream(CanonicalStream),
}

/// A generated/edited image payload forwarded to the adapter. The
/// canonical dialect carries images as data URLs or remote URLs, never
/// raw multipart bytes (see `ImageEditSource`).
#[derive(Debug, Clone)]
pub enum ImageEditRequest {
    Generate(CreateImageRequestBody),
    Edit(CreateImageEditRequestBody),
}

/// The bidirectional-translation contract every provider implements
/// (spec §4.2). Adapters are stateless value objects: they hold no
/// credential state between calls and are safe to share behind an `Arc`.
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn default_base_url(&self) -> &'static str;

    fn list_models_cache_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn list_models(
        &self,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<Vec<String>>;

    async fn process_completion(
        &self,
        request: CompletionRequest,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<UpstreamOutcome>;

    async fn process_embeddings(
        &self,
        _request: CreateEmbeddingRequestBody,
        _credential: &Credential,
        _config: &ProviderConfig,
    ) -> ProviderResult<JsonValue> {
        Err(crate::errors::ProviderError::NotImplemented("embeddings"))
    }

    async fn process_image_generation(
        &self,
        _request: CreateImageRequestBody,
        _credential: &Credential,
        _config: &ProviderConfig,
    ) -> ProviderResult<JsonValue> {
        Err(crate::errors::ProviderError::NotImplemented(
            "image generation",
        ))
    }

    async fn process_image_edits(
        &self,
        _request: CreateImageEditRequestBody,
        _credential: &Credential,
        _config: &ProviderConfig,
    ) -> ProviderResult<JsonValue> {
        Err(crate::errors::ProviderError::NotImplemented("image edits"))
    }

    /// Encodes a decoded `Credential` back into the opaque string stored
    /// (ciphertext-wrapped) by the collaborator persistence layer. The
    /// default is plain JSON; providers never need to override this since
    /// `Credential` already carries every field they need.
    fn serialize_credential(&self, credential: &Credential) -> ProviderResult<String> {
        Ok(serde_json::to_string(credential)
            .map_err(|err| crate::errors::ProviderError::Other(err.to_string()))?)
    }

    fn deserialize_credential(&self, opaque: &str) -> ProviderResult<Credential> {
        serde_json::from_str(opaque)
            .map_err(|err| crate::errors::ProviderError::InvalidSetup(err.to_string()))
    }

    fn mask_credential(&self, opaque: &str) -> ProviderResult<String> {
        let credential = self.deserialize_credential(opaque)?;
        Ok(crate::credential::mask_credential(&credential))
    }
}

/// A completed upstream HTTP request/response pair forwarded to adapters
/// that need raw byte-level control (mostly for streaming bodies).
#[derive(Debug, Clone)]
pub struct RawUpstreamRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}
