use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelObjectType {
    #[serde(rename = "model")]
    Model,
}

/// A model entry in the canonical `GET /v1/models` envelope.
///
/// `owned_by` carries the resolved provider name so a tenant can see which
/// of their configured providers backs a given model id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Model {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub object: ModelObjectType,
    pub created: i64,
    pub owned_by: String,
}
