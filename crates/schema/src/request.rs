//! The unified request envelope and its per-operation payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::UnifiedMessage;
use crate::tool::{UnifiedTool, UnifiedToolChoice};

/// One hop of a fallback chain: if the primary `{provider, model}` fails
/// with a retryable-on-other-provider error, the dispatcher tries these in
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackTarget {
    pub provider: String,
    pub model: String,
}

/// The envelope every public operation shares: who to route to, how to
/// route around failure, and the operation-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedRequest {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub fallbacks: Vec<FallbackTarget>,
    /// Provider-specific passthrough, e.g. an S3 bucket ARN for a Bedrock
    /// batch job. Opaque to the dispatcher; forwarded verbatim to the
    /// provider transport.
    #[serde(default)]
    pub extra_params: Option<BTreeMap<String, Value>>,
    pub payload: UnifiedRequestPayload,
}

/// The full operation surface, as a tagged sum type. Every variant other
/// than `ListModels` carries its operation-specific input; `ListModels`
/// needs nothing beyond the envelope's `provider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum UnifiedRequestPayload {
    Chat(ChatInput),
    Text(TextInput),
    Responses(ResponsesInput),
    Embedding(EmbeddingInput),
    Speech(SpeechInput),
    SpeechStream(SpeechInput),
    Transcription(TranscriptionInput),
    TranscriptionStream(TranscriptionInput),
    ImageGeneration(ImageGenerationInput),
    ImageGenerationStream(ImageGenerationInput),
    CountTokens(CountTokensInput),
    ListModels,
    BatchCreate(BatchCreateInput),
    BatchList(BatchListInput),
    BatchRetrieve(ResourceIdInput),
    BatchCancel(ResourceIdInput),
    BatchResults(ResourceIdInput),
    FileUpload(FileUploadInput),
    FileList(BatchListInput),
    FileRetrieve(ResourceIdInput),
    FileDelete(ResourceIdInput),
    FileContent(ResourceIdInput),
    ContainerCreate(ContainerCreateInput),
    ContainerList(BatchListInput),
    ContainerRetrieve(ResourceIdInput),
    ContainerDelete(ResourceIdInput),
    ContainerFileCreate(ContainerFileCreateInput),
    ContainerFileList(ContainerScopedListInput),
    ContainerFileRetrieve(ContainerScopedIdInput),
    ContainerFileContent(ContainerScopedIdInput),
    ContainerFileDelete(ContainerScopedIdInput),
}

impl UnifiedRequestPayload {
    /// Whether this operation is a streaming variant. Used by the
    /// dispatcher to decide whether to return a response or a stream
    /// channel, and by the fallback executor to apply the "no fallback
    /// after first chunk" rule.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            Self::SpeechStream(_) | Self::TranscriptionStream(_) | Self::ImageGenerationStream(_)
        ) || matches!(self, Self::Chat(input) if input.stream) || matches!(self, Self::Responses(input) if input.stream)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInput {
    pub messages: Vec<UnifiedMessage>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub tools: Option<Vec<UnifiedTool>>,
    #[serde(default)]
    pub tool_choice: Option<UnifiedToolChoice>,
    #[serde(default)]
    pub parallel_tool_calls: Option<bool>,
    #[serde(default)]
    pub metadata: Option<UnifiedMetadata>,
    /// When true, the dispatcher merges the MCP manager's currently
    /// visible tool descriptors into `tools` before the transport is
    /// invoked. Left false by default so a caller who passes its own
    /// closed `tools` list isn't surprised by extras it didn't ask for.
    #[serde(default)]
    pub use_mcp_tools: bool,
}

/// Legacy single-prompt completion. Most providers implement this as a
/// thin wrapper over chat with a single user message; kept distinct at the
/// schema level because a handful of providers (and callers) still expect
/// the plain-prompt wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextInput {
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
}

/// Input for the richer "responses" protocol: structured output items,
/// reasoning summaries and web-search calls, carried over its own
/// event-tagged stream (see [`crate::chunk::ResponsesEventType`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesInput {
    pub messages: Vec<UnifiedMessage>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub tools: Option<Vec<UnifiedTool>>,
    #[serde(default)]
    pub tool_choice: Option<UnifiedToolChoice>,
    #[serde(default)]
    pub stream: bool,
    /// Whether reasoning summaries should be requested, when the model
    /// supports extended thinking.
    #[serde(default)]
    pub reasoning_summary: bool,
    /// See [`ChatInput::use_mcp_tools`].
    #[serde(default)]
    pub use_mcp_tools: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingTextInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingInput {
    pub input: EmbeddingTextInput,
    #[serde(default)]
    pub dimensions: Option<u32>,
    #[serde(default)]
    pub encoding_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechInput {
    pub text: String,
    pub voice: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub speed: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionInput {
    /// Raw audio bytes, base64-encoded at the HTTP boundary but carried
    /// here as decoded bytes since the dispatcher core never sees wire
    /// encoding.
    #[serde(with = "serde_bytes_base64")]
    pub audio: Vec<u8>,
    pub filename: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationInput {
    pub prompt: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub n: Option<u32>,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountTokensInput {
    pub messages: Vec<UnifiedMessage>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub tools: Option<Vec<UnifiedTool>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCreateInput {
    /// Identifier of a previously-uploaded file containing one request per
    /// line (the JSONL batch-input convention most providers share).
    pub input_file_id: String,
    pub endpoint: String,
    #[serde(default)]
    pub completion_window: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchListInput {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceIdInput {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUploadInput {
    #[serde(with = "serde_bytes_base64")]
    pub content: Vec<u8>,
    pub filename: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerCreateInput {
    pub name: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerFileCreateInput {
    pub container_id: String,
    #[serde(with = "serde_bytes_base64")]
    pub content: Vec<u8>,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerScopedListInput {
    pub container_id: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerScopedIdInput {
    pub container_id: String,
    pub file_id: String,
}

/// Request-tracking metadata, currently only consumed by Anthropic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedMetadata {
    pub user_id: Option<String>,
}

pub(crate) mod serde_bytes_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
