pub use crate::openai::completions::types::CompletionEnvelope as CreateCompletionResponse;
