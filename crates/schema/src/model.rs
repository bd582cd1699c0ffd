//! Model-listing types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedObjectType {
    Model,
    List,
    #[serde(rename = "chat.completion")]
    ChatCompletion,
    #[serde(rename = "chat.completion.chunk")]
    ChatCompletionChunk,
    Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedModel {
    pub id: String,
    #[serde(rename = "type", alias = "object")]
    pub object_type: UnifiedObjectType,
    pub display_name: String,
    pub created: u64,
    pub owned_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedModelsResponse {
    #[serde(rename = "type", alias = "object")]
    pub object_type: UnifiedObjectType,
    pub models: Vec<UnifiedModel>,
    pub has_more: bool,
}
