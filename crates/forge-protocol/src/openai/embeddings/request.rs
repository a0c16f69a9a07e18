use serde::{Deserialize, Serialize};

use crate::openai::embeddings::types::{EmbeddingEncodingFormat, EmbeddingInput};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreateEmbeddingRequestBody {
    pub input: EmbeddingInput,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<EmbeddingEncodingFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Only supported by models that support reduced embedding dimensions
    /// (not enforced here).
    pub dimensions: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateEmbeddingRequest {
    pub body: CreateEmbeddingRequestBody,
}
