pub mod chat_completions;
pub mod completions;
pub mod embeddings;
pub mod images;
pub mod list_models;
pub mod responses;
pub mod types;
