//! Protocol-agnostic chat message types, shared by the chat, responses and
//! agent-mode operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::UnifiedToolCall;

/// Role of a message's sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Container for message content with flexible representation: a plain
/// string for the common case, or an ordered list of content blocks for
/// multi-modal or tool-bearing messages. Untagged so a plain JSON string
/// round-trips without wrapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnifiedContentContainer {
    Text(String),
    Blocks(Vec<UnifiedContent>),
}

impl UnifiedContentContainer {
    /// Concatenates all text blocks, ignoring images and tool blocks. Used
    /// wherever a caller needs a flat string (token counting, logging).
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(UnifiedContent::as_text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// A single block of message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnifiedContent {
    Text { text: String },
    Image { source: UnifiedImageSource },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_call_id: String, content: UnifiedToolResultContent, is_error: Option<bool> },
}

impl UnifiedContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Output of a tool invocation fed back to the model, either as plain text
/// or as further content blocks (e.g. an image a tool produced).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnifiedToolResultContent {
    Text(String),
    Blocks(Vec<UnifiedContent>),
}

/// Where image bytes for a content block come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnifiedImageSource {
    Url { url: String },
    Base64 { media_type: String, data: String },
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedMessage {
    pub role: UnifiedRole,
    pub content: UnifiedContentContainer,

    /// Tool calls made by the assistant in this message. Primarily present
    /// for OpenAI-shaped wire compatibility; providers that represent tool
    /// calls as content blocks (Anthropic) instead populate this lazily via
    /// [`UnifiedMessage::compute_tool_calls`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<UnifiedToolCall>>,

    /// Correlates a tool-role message back to the call that produced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl UnifiedMessage {
    pub fn text(role: UnifiedRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: UnifiedContentContainer::Text(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Derives the tool calls an assistant message made from its content
    /// blocks, so providers that encode tool calls as `ToolUse` blocks
    /// (Anthropic) don't need to duplicate them into `tool_calls`.
    pub fn compute_tool_calls(&self) -> Option<Vec<UnifiedToolCall>> {
        if let Some(explicit) = &self.tool_calls {
            return Some(explicit.clone());
        }

        let UnifiedContentContainer::Blocks(blocks) = &self.content else {
            return None;
        };

        let calls: Vec<_> = blocks
            .iter()
            .filter_map(|block| match block {
                UnifiedContent::ToolUse { id, name, input } => Some(UnifiedToolCall::new(id.clone(), name.clone(), input.clone())),
                _ => None,
            })
            .collect();

        if calls.is_empty() { None } else { Some(calls) }
    }
}
