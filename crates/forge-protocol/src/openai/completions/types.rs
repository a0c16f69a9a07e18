use serde::{Deserialize, Serialize};

use crate::openai::chat_completions::types::{ChatCompletionFinishReason, CompletionUsage};

/// Legacy `/v1/completions` takes either a single prompt or a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionPrompt {
    Single(String),
    Many(Vec<String>),
    /// Pre-tokenized prompt(s), accepted on a best-effort basis by adapters
    /// that can round-trip token ids; most providers reject this.
    Tokens(Vec<i64>),
    TokenBatches(Vec<Vec<i64>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionObjectType {
    #[serde(rename = "text_completion")]
    TextCompletion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletionLogprobs {
    pub tokens: Vec<String>,
    pub token_logprobs: Vec<Option<f64>>,
    pub top_logprobs: Vec<Option<serde_json::Map<String, serde_json::Value>>>,
    pub text_offset: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletionChoice {
    pub text: String,
    pub index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<CompletionLogprobs>,
    pub finish_reason: Option<ChatCompletionFinishReason>,
}

/// Shared body for both the unary response and each stream chunk — legacy
/// completions use the same envelope shape for both (no distinct chunk type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletionEnvelope {
    pub id: String,
    pub object: CompletionObjectType,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}
