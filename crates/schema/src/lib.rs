//! Protocol-agnostic unified types for LLM interactions.
//!
//! This crate is the single source of truth for request, response, stream
//! chunk, tool and error shapes that every provider transport in `gateway`
//! converts to and from. Keeping them in a leaf crate (rather than inline
//! in `gateway`) lets `mcp` depend on the tool/error types without pulling
//! in the dispatcher.

pub mod admin;
pub mod chunk;
pub mod error;
pub mod mcp;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod tool;

pub use admin::{
    ResponseMeta, UnifiedBatch, UnifiedBatchListResponse, UnifiedBatchRequestCounts, UnifiedBatchResponse, UnifiedBatchResultsResponse, UnifiedContainer,
    UnifiedContainerFile, UnifiedContainerFileContentResponse, UnifiedContainerFileListResponse, UnifiedContainerFileResponse, UnifiedContainerListResponse,
    UnifiedContainerResponse, UnifiedDeletedResponse, UnifiedEmbedding, UnifiedEmbeddingResponse, UnifiedFile, UnifiedFileContentResponse, UnifiedFileListResponse,
    UnifiedFileResponse, UnifiedGeneratedImage, UnifiedImageGenerationResponse, UnifiedOpaqueResponse, UnifiedSpeechResponse, UnifiedTranscriptionResponse,
};
pub use chunk::{StreamChunk, StreamChunkBody};
pub use error::{ErrorCategory, ErrorField};
pub use mcp::McpToolDescriptor;
pub use message::{UnifiedContent, UnifiedContentContainer, UnifiedImageSource, UnifiedMessage, UnifiedRole, UnifiedToolResultContent};
pub use model::{UnifiedModel, UnifiedModelsResponse, UnifiedObjectType};
pub use request::{FallbackTarget, UnifiedRequest, UnifiedRequestPayload};
pub use response::{UnifiedChoice, UnifiedFinishReason, UnifiedResponse, UnifiedResponseBody, UnifiedStopReason, UnifiedUsage};
pub use tool::{UnifiedArguments, UnifiedFunction, UnifiedFunctionCall, UnifiedTool, UnifiedToolCall, UnifiedToolChoice};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::UnifiedContentContainer;
    use crate::request::{ChatInput, UnifiedRequestPayload};

    #[test]
    fn tool_use_block_computes_into_tool_call() {
        let message = UnifiedMessage {
            role: UnifiedRole::Assistant,
            content: UnifiedContentContainer::Blocks(vec![UnifiedContent::ToolUse {
                id: "toolu_1".to_string(),
                name: "get_weather".to_string(),
                input: serde_json::json!({"location": "New York"}),
            }]),
            tool_calls: None,
            tool_call_id: None,
        };

        let calls = message.compute_tool_calls().expect("one tool call");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_weather");
    }

    #[test]
    fn chat_payload_is_streaming_only_when_requested() {
        let input = ChatInput {
            messages: vec![UnifiedMessage::text(UnifiedRole::User, "hi")],
            system: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop_sequences: None,
            stream: true,
            tools: None,
            tool_choice: None,
            parallel_tool_calls: None,
            metadata: None,
            use_mcp_tools: false,
        };
        assert!(UnifiedRequestPayload::Chat(input).is_streaming());
    }

    #[test]
    fn content_container_text_roundtrips_as_plain_string() {
        let container = UnifiedContentContainer::Text("hello".to_string());
        let json = serde_json::to_string(&container).unwrap();
        assert_eq!(json, "\"hello\"");
    }
}
