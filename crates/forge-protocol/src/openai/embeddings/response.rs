use serde::{Deserialize, Serialize};

use crate::openai::embeddings::types::{Embedding, EmbeddingListObjectType, EmbeddingUsage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreateEmbeddingResponse {
    pub object: EmbeddingListObjectType,
    pub data: Vec<Embedding>,
    pub model: String,
    pub usage: EmbeddingUsage,
}
