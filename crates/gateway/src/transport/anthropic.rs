//! Anthropic Messages API transport.

use std::time::Instant;

use async_trait::async_trait;
use config::ProviderType;
use context::RequestContext;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use header_rules::HeaderRule;
use reqwest::{Client, Method, header::CONTENT_TYPE};
use schema::chunk::{StreamChunkBody, UnifiedChunk, UnifiedChoiceDelta, UnifiedFunctionDelta, UnifiedFunctionStart, UnifiedMessageDelta, UnifiedStreamingToolCall};
use schema::message::{UnifiedContent, UnifiedContentContainer, UnifiedMessage, UnifiedRole};
use schema::request::{ChatInput, TextInput, UnifiedRequestPayload};
use schema::response::{UnifiedChoice, UnifiedFinishReason, UnifiedResponse, UnifiedStopReason, UnifiedUsage};
use schema::ErrorField;

use crate::account::SelectedAccount;
use crate::error as gw_error;
use crate::provider::{ProviderOutcome, ProviderTransport, boxed_response};
use crate::stream::{ChatToolCallAccumulator, ChunkStream, Sequencer};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicTransport {
    client: Client,
    headers: Vec<HeaderRule>,
}

impl AnthropicTransport {
    pub fn new(client: Client, headers: Vec<HeaderRule>) -> Self {
        Self { client, headers }
    }

    fn request(&self, url: &str, account: &SelectedAccount, ctx: &RequestContext) -> reqwest::RequestBuilder {
        let mut headers = http::HeaderMap::new();
        header_rules::apply(&self.headers, &ctx.headers, &mut headers);

        self.client
            .request(Method::POST, url)
            .headers(headers)
            .header("x-api-key", account.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header(CONTENT_TYPE, "application/json")
    }

    async fn messages(&self, model: &str, account: &SelectedAccount, base_url: Option<&str>, input: &ChatInput, ctx: &RequestContext) -> Result<UnifiedResponse, ErrorField> {
        let url = format!("{}/messages", base_url.unwrap_or(DEFAULT_BASE_URL));
        let body = anthropic_request(model, input, false);

        let started = Instant::now();
        let response = self.request(&url, account, ctx).json(&body).send().await.map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let value: serde_json::Value = response.json().await.map_err(|err| gw_error::from_transport_error(&err))?;
        parse_anthropic_response(value, model, started.elapsed().as_millis() as u64)
    }

    async fn messages_stream(&self, model: &str, account: &SelectedAccount, base_url: Option<&str>, input: &ChatInput, ctx: &RequestContext) -> Result<ChunkStream, ErrorField> {
        let url = format!("{}/messages", base_url.unwrap_or(DEFAULT_BASE_URL));
        let body = anthropic_request(model, input, true);

        let response = self.request(&url, account, ctx).json(&body).send().await.map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let byte_stream = response.bytes_stream();
        let event_stream = byte_stream.eventsource();
        let sequencer = Sequencer::new("anthropic");
        let accumulator = ChatToolCallAccumulator::new();
        let model = model.to_string();

        let chunk_stream = futures::stream::unfold((Box::pin(event_stream), accumulator, sequencer, model), |(mut stream, mut accumulator, mut sequencer, model)| async move {
            loop {
                let event = stream.next().await?;
                let Ok(event) = event else { continue };
                let Ok(value) = serde_json::from_str::<serde_json::Value>(&event.data) else { continue };

                let event_type = value["type"].as_str().unwrap_or_default();
                match event_type {
                    "content_block_delta" => {
                        let delta = &value["delta"];
                        match delta["type"].as_str() {
                            Some("text_delta") => {
                                let text = delta["text"].as_str().unwrap_or_default().to_string();
                                let chunk = delta_chunk(&model, Some(text), None);
                                return Some((Ok(sequencer.stamp(StreamChunkBody::Chat(chunk), false)), (stream, accumulator, sequencer, model)));
                            }
                            Some("input_json_delta") => {
                                let index = value["index"].as_u64().unwrap_or(0) as usize;
                                accumulator.accept(&UnifiedStreamingToolCall::Delta {
                                    index,
                                    function: UnifiedFunctionDelta { arguments: delta["partial_json"].as_str().unwrap_or_default().to_string() },
                                });
                            }
                            _ => {}
                        }
                    }
                    "content_block_start" => {
                        let block = &value["content_block"];
                        if block["type"].as_str() == Some("tool_use") {
                            let index = value["index"].as_u64().unwrap_or(0) as usize;
                            accumulator.accept(&UnifiedStreamingToolCall::Start {
                                index,
                                id: block["id"].as_str().unwrap_or_default().to_string(),
                                function: UnifiedFunctionStart { name: block["name"].as_str().unwrap_or_default().to_string(), arguments: String::new() },
                            });
                        }
                    }
                    "message_stop" => {
                        let chunk = terminal_tool_call_chunk(&model, accumulator);
                        return Some((Ok(sequencer.stamp(StreamChunkBody::Chat(chunk), true)), (stream, ChatToolCallAccumulator::new(), sequencer, model)));
                    }
                    "error" => {
                        let error = ErrorField::new(schema::ErrorCategory::Upstream5xx, value["error"]["message"].as_str().unwrap_or("anthropic stream error").to_string());
                        return Some((Err(error), (stream, accumulator, sequencer, model)));
                    }
                    _ => {}
                }
            }
        });

        Ok(Box::pin(chunk_stream))
    }
}

fn delta_chunk(model: &str, content: Option<String>, tool_calls: Option<Vec<UnifiedStreamingToolCall>>) -> UnifiedChunk {
    UnifiedChunk {
        id: String::new(),
        model: model.to_string(),
        choices: vec![UnifiedChoiceDelta { index: 0, delta: UnifiedMessageDelta { role: None, content, tool_calls }, finish_reason: None }],
        usage: None,
        created: 0,
    }
}

fn terminal_tool_call_chunk(model: &str, accumulator: ChatToolCallAccumulator) -> UnifiedChunk {
    let calls = accumulator.finish();
    let finish_reason = if calls.is_empty() { Some(UnifiedFinishReason::Stop) } else { Some(UnifiedFinishReason::ToolCalls) };
    UnifiedChunk {
        id: String::new(),
        model: model.to_string(),
        choices: vec![UnifiedChoiceDelta { index: 0, delta: UnifiedMessageDelta::default(), finish_reason }],
        usage: None,
        created: 0,
    }
}

#[async_trait]
impl ProviderTransport for AnthropicTransport {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Anthropic
    }

    async fn invoke(
        &self,
        model: &str,
        account: &SelectedAccount,
        base_url: Option<&str>,
        payload: &UnifiedRequestPayload,
        ctx: &RequestContext,
    ) -> Result<ProviderOutcome, ErrorField> {
        match payload {
            UnifiedRequestPayload::Chat(input) if input.stream => Ok(ProviderOutcome::Stream(self.messages_stream(model, account, base_url, input, ctx).await?)),
            UnifiedRequestPayload::Chat(input) => Ok(boxed_response(self.messages(model, account, base_url, input, ctx).await?)),
            UnifiedRequestPayload::Text(input) => Ok(boxed_response(self.messages(model, account, base_url, &chat_input_from_text(input), ctx).await?)),
            _ => Err(ErrorField::unsupported_operation("anthropic transport does not implement this operation")),
        }
    }
}

fn chat_input_from_text(input: &TextInput) -> ChatInput {
    ChatInput {
        messages: vec![UnifiedMessage::text(UnifiedRole::User, input.prompt.clone())],
        system: None,
        max_tokens: input.max_tokens.or(Some(4096)),
        temperature: input.temperature,
        top_p: None,
        top_k: None,
        frequency_penalty: None,
        presence_penalty: None,
        stop_sequences: input.stop_sequences.clone(),
        stream: input.stream,
        tools: None,
        tool_choice: None,
        parallel_tool_calls: None,
        metadata: None,
        use_mcp_tools: false,
    }
}

fn anthropic_request(model: &str, input: &ChatInput, stream: bool) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = input
        .messages
        .iter()
        .filter(|message| message.role != UnifiedRole::System)
        .map(wire_message)
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "max_tokens": input.max_tokens.unwrap_or(4096),
        "stream": stream,
    });
    let object = body.as_object_mut().expect("object literal");
    if let Some(system) = &input.system {
        object.insert("system".to_string(), serde_json::json!(system));
    }
    if let Some(v) = input.temperature { object.insert("temperature".to_string(), serde_json::json!(v)); }
    if let Some(v) = input.top_p { object.insert("top_p".to_string(), serde_json::json!(v)); }
    if let Some(v) = input.top_k { object.insert("top_k".to_string(), serde_json::json!(v)); }
    if let Some(v) = &input.stop_sequences { object.insert("stop_sequences".to_string(), serde_json::json!(v)); }
    if let Some(tools) = &input.tools {
        let wire_tools: Vec<_> = tools
            .iter()
            .map(|tool| serde_json::json!({"name": tool.function.name, "description": tool.function.description, "input_schema": tool.function.parameters}))
            .collect();
        object.insert("tools".to_string(), serde_json::json!(wire_tools));
    }
    body
}

fn wire_message(message: &UnifiedMessage) -> serde_json::Value {
    let role = match message.role {
        UnifiedRole::Assistant => "assistant",
        _ => "user",
    };
    let content = match &message.content {
        UnifiedContentContainer::Text(text) => serde_json::json!(text),
        UnifiedContentContainer::Blocks(blocks) => serde_json::json!(
            blocks.iter().map(wire_content_block).collect::<Vec<_>>()
        ),
    };
    serde_json::json!({"role": role, "content": content})
}

fn wire_content_block(block: &UnifiedContent) -> serde_json::Value {
    match block {
        UnifiedContent::Text { text } => serde_json::json!({"type": "text", "text": text}),
        UnifiedContent::ToolUse { id, name, input } => serde_json::json!({"type": "tool_use", "id": id, "name": name, "input": input}),
        UnifiedContent::ToolResult { tool_call_id, content, is_error } => serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_call_id,
            "content": match content {
                schema::message::UnifiedToolResultContent::Text(text) => serde_json::json!(text),
                schema::message::UnifiedToolResultContent::Blocks(blocks) => serde_json::json!(blocks.iter().map(wire_content_block).collect::<Vec<_>>()),
            },
            "is_error": is_error.unwrap_or(false),
        }),
        UnifiedContent::Image { source } => match source {
            schema::message::UnifiedImageSource::Url { url } => serde_json::json!({"type": "image", "source": {"type": "url", "url": url}}),
            schema::message::UnifiedImageSource::Base64 { media_type, data } => serde_json::json!({"type": "image", "source": {"type": "base64", "media_type": media_type, "data": data}}),
        },
    }
}

fn parse_anthropic_response(value: serde_json::Value, model_requested: &str, latency_ms: u64) -> Result<UnifiedResponse, ErrorField> {
    let id = value["id"].as_str().unwrap_or_default().to_string();
    let model = value["model"].as_str().unwrap_or(model_requested).to_string();

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in value["content"].as_array().cloned().unwrap_or_default() {
        match block["type"].as_str() {
            Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
            Some("tool_use") => tool_calls.push(schema::UnifiedToolCall {
                id: block["id"].as_str().unwrap_or_default().to_string(),
                function: schema::UnifiedFunctionCall {
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: schema::UnifiedArguments::Value(block["input"].clone()),
                },
            }),
            _ => {}
        }
    }

    let stop_reason = value["stop_reason"].as_str().and_then(stop_reason_from_str);
    let finish_reason = match stop_reason {
        Some(UnifiedStopReason::ToolUse) => Some(UnifiedFinishReason::ToolCalls),
        Some(UnifiedStopReason::MaxTokens) => Some(UnifiedFinishReason::Length),
        Some(_) => Some(UnifiedFinishReason::Stop),
        None => None,
    };

    let usage = &value["usage"];
    Ok(UnifiedResponse {
        id,
        model: model.clone(),
        choices: vec![UnifiedChoice {
            index: 0,
            message: UnifiedMessage {
                role: UnifiedRole::Assistant,
                content: UnifiedContentContainer::Text(text),
                tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                tool_call_id: None,
            },
            finish_reason,
        }],
        usage: UnifiedUsage {
            prompt_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage["output_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as u32 + usage["output_tokens"].as_u64().unwrap_or(0) as u32,
            audio_tokens: None,
            reasoning_tokens: None,
        },
        created: 0,
        stop_reason,
        stop_sequence: value["stop_sequence"].as_str().map(str::to_string),
        provider: "anthropic".to_string(),
        model_requested: model_requested.to_string(),
        latency_ms,
        extra_fields: Default::default(),
    })
}

fn stop_reason_from_str(value: &str) -> Option<UnifiedStopReason> {
    match value {
        "end_turn" => Some(UnifiedStopReason::EndTurn),
        "max_tokens" => Some(UnifiedStopReason::MaxTokens),
        "stop_sequence" => Some(UnifiedStopReason::StopSequence),
        "tool_use" => Some(UnifiedStopReason::ToolUse),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_is_hoisted_out_of_messages_array() {
        let input = ChatInput {
            messages: vec![UnifiedMessage::text(UnifiedRole::System, "be terse"), UnifiedMessage::text(UnifiedRole::User, "hi")],
            system: Some("be terse".to_string()),
            max_tokens: Some(100),
            temperature: None,
            top_p: None,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop_sequences: None,
            stream: false,
            tools: None,
            tool_choice: None,
            parallel_tool_calls: None,
            metadata: None,
            use_mcp_tools: false,
        };
        let body = anthropic_request("claude-3-5-sonnet", &input, false);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["system"], "be terse");
    }

    #[test]
    fn parses_tool_use_block_into_tool_call() {
        let value = serde_json::json!({
            "id": "msg_1",
            "model": "claude-3-5-sonnet",
            "content": [{"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "NYC"}}],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5},
        });
        let response = parse_anthropic_response(value, "claude-3-5-sonnet", 50).unwrap();
        assert_eq!(response.stop_reason, Some(UnifiedStopReason::ToolUse));
        assert_eq!(response.choices[0].finish_reason, Some(UnifiedFinishReason::ToolCalls));
        assert_eq!(response.choices[0].message.tool_calls.as_ref().unwrap()[0].function.name, "get_weather");
    }
}
