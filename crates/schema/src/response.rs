//! Non-streaming response types, common across chat/text/responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::admin::{
    UnifiedBatchListResponse, UnifiedBatchResponse, UnifiedBatchResultsResponse, UnifiedContainerFileContentResponse, UnifiedContainerFileListResponse,
    UnifiedContainerFileResponse, UnifiedContainerListResponse, UnifiedContainerResponse, UnifiedDeletedResponse, UnifiedEmbeddingResponse, UnifiedFileContentResponse,
    UnifiedFileListResponse, UnifiedFileResponse, UnifiedImageGenerationResponse, UnifiedSpeechResponse, UnifiedTranscriptionResponse,
};
use crate::message::UnifiedMessage;

/// A complete (non-streaming) response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<UnifiedChoice>,
    pub usage: UnifiedUsage,
    pub created: u64,
    #[serde(default)]
    pub stop_reason: Option<UnifiedStopReason>,
    #[serde(default)]
    pub stop_sequence: Option<String>,

    /// Echo of the provider that ultimately served this response, which
    /// may differ from the request's primary provider when the dispatcher
    /// fell back.
    pub provider: String,
    /// The model the caller asked for, before any fallback substitution.
    pub model_requested: String,
    pub latency_ms: u64,
    /// Arbitrary provider-specific fields the unified shape doesn't model,
    /// preserved for passthrough rather than silently dropped.
    #[serde(default)]
    pub extra_fields: std::collections::BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedChoice {
    pub index: u32,
    pub message: UnifiedMessage,
    pub finish_reason: Option<UnifiedFinishReason>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UnifiedUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default)]
    pub audio_tokens: Option<u32>,
    #[serde(default)]
    pub reasoning_tokens: Option<u32>,
}

/// Reason generation stopped, in OpenAI's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedFinishReason {
    Stop,
    #[serde(alias = "max_tokens")]
    Length,
    ContentFilter,
    ToolCalls,
}

impl std::fmt::Display for UnifiedFinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content_filter",
            Self::ToolCalls => "tool_calls",
        };
        f.write_str(s)
    }
}

/// Reason generation stopped, in Anthropic's vocabulary. Kept alongside
/// [`UnifiedFinishReason`] rather than collapsed into it, since providers
/// that emit it carry more detail (e.g. which stop sequence matched) than
/// the OpenAI-shaped field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedStopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

/// The full non-streaming response surface, as a tagged sum type mirroring
/// [`crate::request::UnifiedRequestPayload`]. A [`crate::provider`]-style
/// transport returns exactly one variant per operation kind; the
/// dispatcher and HTTP edge never need to know which beyond what
/// `serde`'s tag carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum UnifiedResponseBody {
    Chat(UnifiedResponse),
    Embedding(UnifiedEmbeddingResponse),
    Speech(UnifiedSpeechResponse),
    Transcription(UnifiedTranscriptionResponse),
    ImageGeneration(UnifiedImageGenerationResponse),
    Batch(UnifiedBatchResponse),
    BatchList(UnifiedBatchListResponse),
    BatchResults(UnifiedBatchResultsResponse),
    File(UnifiedFileResponse),
    FileList(UnifiedFileListResponse),
    FileContent(UnifiedFileContentResponse),
    Container(UnifiedContainerResponse),
    ContainerList(UnifiedContainerListResponse),
    ContainerFile(UnifiedContainerFileResponse),
    ContainerFileList(UnifiedContainerFileListResponse),
    ContainerFileContent(UnifiedContainerFileContentResponse),
    Deleted(UnifiedDeletedResponse),
}

impl From<UnifiedResponse> for UnifiedResponseBody {
    fn from(response: UnifiedResponse) -> Self {
        Self::Chat(response)
    }
}

impl UnifiedResponseBody {
    /// Overwrites the echoed `provider` field with the one that actually
    /// served this response. Transports only know their own wire family
    /// (`"openai"`, `"anthropic"`, ...), not the configured provider *key*
    /// the dispatcher resolved this attempt against (which may be a
    /// fallback, e.g. `"secondary"`) — the dispatcher calls this once an
    /// attempt succeeds so the caller sees the key that actually served
    /// the request, per the contract on the `provider` field above.
    pub fn set_provider(&mut self, provider: &str) {
        match self {
            Self::Chat(response) => response.provider = provider.to_string(),
            Self::Embedding(response) => response.meta.provider = provider.to_string(),
            Self::Speech(response) => response.meta.provider = provider.to_string(),
            Self::Transcription(response) => response.meta.provider = provider.to_string(),
            Self::ImageGeneration(response) => response.meta.provider = provider.to_string(),
            Self::Batch(response) => response.meta.provider = provider.to_string(),
            Self::BatchList(response) => response.meta.provider = provider.to_string(),
            Self::BatchResults(response) => response.meta.provider = provider.to_string(),
            Self::File(response) => response.meta.provider = provider.to_string(),
            Self::FileList(response) => response.meta.provider = provider.to_string(),
            Self::FileContent(response) => response.meta.provider = provider.to_string(),
            Self::Container(response) => response.meta.provider = provider.to_string(),
            Self::ContainerList(response) => response.meta.provider = provider.to_string(),
            Self::ContainerFile(response) => response.meta.provider = provider.to_string(),
            Self::ContainerFileList(response) => response.meta.provider = provider.to_string(),
            Self::ContainerFileContent(response) => response.meta.provider = provider.to_string(),
            Self::Deleted(response) => response.meta.provider = provider.to_string(),
        }
    }
}
