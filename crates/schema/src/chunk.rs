//! Streaming chunk types.
//!
//! A stream is a sequence of [`StreamChunk`]s: a monotonically increasing
//! `sequence` within one stream, a `provider` echo, and `latency_ms` (zero
//! on every chunk but the terminal one, which carries the whole stream's
//! end-to-end latency). Exactly one terminal chunk closes the channel,
//! either a content chunk with `finish_reason`/`completed` set, or an
//! [`ErrorChunk`].

use serde::{Deserialize, Serialize};

use crate::error::ErrorField;
use crate::message::UnifiedRole;
use crate::response::{UnifiedFinishReason, UnifiedUsage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub sequence: u64,
    pub provider: String,
    pub latency_ms: u64,
    /// Test-oracle signal: set on the terminal chunk when the router's
    /// inter-chunk-arrival heuristic flagged this stream as batched
    /// (upstream claimed incremental delivery but buffered everything and
    /// emitted it near-simultaneously). Always `false` on non-terminal
    /// chunks. Informational only — never consulted by dispatch/fallback.
    #[serde(default)]
    pub batched: bool,
    #[serde(flatten)]
    pub body: StreamChunkBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamChunkBody {
    Chat(UnifiedChunk),
    Text(TextChunk),
    Responses(ResponsesChunk),
    ImageGeneration(ImageGenerationChunk),
    Speech(SpeechChunk),
    Transcription(TranscriptionChunk),
    Error(ErrorChunk),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorChunk {
    pub error: ErrorField,
}

/// A chat-completion streaming chunk (OpenAI-shaped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedChunk {
    pub id: String,
    pub model: String,
    pub choices: Vec<UnifiedChoiceDelta>,
    #[serde(default)]
    pub usage: Option<UnifiedUsage>,
    pub created: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedChoiceDelta {
    pub index: u32,
    pub delta: UnifiedMessageDelta,
    #[serde(default)]
    pub finish_reason: Option<UnifiedFinishReason>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedMessageDelta {
    #[serde(default)]
    pub role: Option<UnifiedRole>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<UnifiedStreamingToolCall>>,
}

/// A tool call being built incrementally: a `Start` establishes id/name,
/// then zero or more `Delta`s append argument bytes in arrival order.
/// Keyed by `index`; the accumulator in the gateway crate uses the tool
/// call's `id` when present and falls back to `index` otherwise, per the
/// same-index-same-call convention OpenAI's wire format uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnifiedStreamingToolCall {
    Start { index: usize, id: String, function: UnifiedFunctionStart },
    Delta { index: usize, function: UnifiedFunctionDelta },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFunctionStart {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFunctionDelta {
    pub arguments: String,
}

/// A text-completion streaming chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: String,
    pub model: String,
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<UnifiedFinishReason>,
}

/// The closed set of event types a responses-API stream may emit, per the
/// state machine: `created -> in_progress -> output_item.added ->
/// content_part.added -> (output_text.delta | function_call.arguments.delta
/// | reasoning.*)* -> content_part.done -> output_item.done -> completed`,
/// interruptible at any point by `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsesEventType {
    Created,
    InProgress,
    #[serde(rename = "output_item.added")]
    OutputItemAdded,
    #[serde(rename = "content_part.added")]
    ContentPartAdded,
    #[serde(rename = "output_text.delta")]
    OutputTextDelta,
    #[serde(rename = "output_text.done")]
    OutputTextDone,
    #[serde(rename = "content_part.done")]
    ContentPartDone,
    #[serde(rename = "output_item.done")]
    OutputItemDone,
    #[serde(rename = "function_call.arguments.delta")]
    FunctionCallArgumentsDelta,
    #[serde(rename = "function_call.arguments.done")]
    FunctionCallArgumentsDone,
    #[serde(rename = "reasoning.summary.part.added")]
    ReasoningSummaryPartAdded,
    #[serde(rename = "reasoning.summary.text.delta")]
    ReasoningSummaryTextDelta,
    #[serde(rename = "web_search_call.in_progress")]
    WebSearchCallInProgress,
    #[serde(rename = "web_search_call.searching")]
    WebSearchCallSearching,
    #[serde(rename = "web_search_call.completed")]
    WebSearchCallCompleted,
    Error,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesChunk {
    pub event_type: ResponsesEventType,
    /// Identifies the output item this event belongs to; absent for
    /// stream-level events (`created`, `in_progress`, `completed`).
    #[serde(default)]
    pub item_id: Option<String>,
    /// Index of the content part within its output item, for
    /// `content_part.*` and `*.delta`/`*.done` events.
    #[serde(default)]
    pub content_index: Option<u32>,
    #[serde(default)]
    pub delta: Option<String>,
    #[serde(default)]
    pub usage: Option<UnifiedUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationChunk {
    /// Base64-encoded partial or final image bytes, per the provider's
    /// progressive-render convention.
    pub b64_data: String,
    pub index: u32,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechChunk {
    pub audio: Vec<u8>,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionChunk {
    pub text_delta: String,
    pub done: bool,
}
