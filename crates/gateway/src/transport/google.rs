//! Google Gemini REST transport (`generativelanguage.googleapis.com`).
//! Vertex-flavored custom providers share this transport with a different
//! base URL; the API key is carried as a query parameter rather than a
//! header, per Google's convention.

use std::time::Instant;

use async_trait::async_trait;
use config::ProviderType;
use context::RequestContext;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use header_rules::HeaderRule;
use reqwest::{Client, Method};
use schema::chunk::{StreamChunkBody, UnifiedChoiceDelta, UnifiedChunk, UnifiedMessageDelta};
use schema::message::{UnifiedContentContainer, UnifiedMessage, UnifiedRole};
use schema::request::{ChatInput, UnifiedRequestPayload};
use schema::response::{UnifiedChoice, UnifiedFinishReason, UnifiedResponse, UnifiedUsage};
use schema::ErrorField;

use crate::account::SelectedAccount;
use crate::error as gw_error;
use crate::provider::{ProviderOutcome, ProviderTransport, boxed_response};
use crate::stream::{ChunkStream, Sequencer};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleTransport {
    client: Client,
    headers: Vec<HeaderRule>,
}

impl GoogleTransport {
    pub fn new(client: Client, headers: Vec<HeaderRule>) -> Self {
        Self { client, headers }
    }

    fn request(&self, url: &str, ctx: &RequestContext) -> reqwest::RequestBuilder {
        let mut headers = http::HeaderMap::new();
        header_rules::apply(&self.headers, &ctx.headers, &mut headers);
        self.client.request(Method::POST, url).headers(headers)
    }

    async fn generate(&self, model: &str, account: &SelectedAccount, base_url: Option<&str>, input: &ChatInput, ctx: &RequestContext) -> Result<UnifiedResponse, ErrorField> {
        let url = format!("{}/models/{model}:generateContent?key={}", base_url.unwrap_or(DEFAULT_BASE_URL), account.expose());
        let body = gemini_request(input);

        let started = Instant::now();
        let response = self.request(&url, ctx).json(&body).send().await.map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let value: serde_json::Value = response.json().await.map_err(|err| gw_error::from_transport_error(&err))?;
        parse_gemini_response(value, model, started.elapsed().as_millis() as u64)
    }

    async fn generate_stream(&self, model: &str, account: &SelectedAccount, base_url: Option<&str>, input: &ChatInput, ctx: &RequestContext) -> Result<ChunkStream, ErrorField> {
        let url = format!("{}/models/{model}:streamGenerateContent?alt=sse&key={}", base_url.unwrap_or(DEFAULT_BASE_URL), account.expose());
        let body = gemini_request(input);

        let response = self.request(&url, ctx).json(&body).send().await.map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let mut sequencer = Sequencer::new("google");
        let byte_stream = response.bytes_stream();
        let event_stream = byte_stream.eventsource();
        let model = model.to_string();

        let chunk_stream = event_stream.filter_map(move |event| {
            let result = match event {
                Ok(event) => match serde_json::from_str::<serde_json::Value>(&event.data) {
                    Ok(value) => {
                        let finished = value["candidates"][0]["finishReason"].is_string();
                        Some(Ok(sequencer.stamp(StreamChunkBody::Chat(gemini_chunk_to_unified(value, &model)), finished)))
                    }
                    Err(err) => Some(Err(gw_error::internal(format!("failed to parse Gemini stream chunk: {err}")))),
                },
                Err(err) => Some(Err(ErrorField::new(schema::ErrorCategory::StreamProtocol, err.to_string()))),
            };
            async move { result }
        });

        Ok(Box::pin(chunk_stream))
    }
}

fn gemini_request(input: &ChatInput) -> serde_json::Value {
    let contents: Vec<serde_json::Value> = input
        .messages
        .iter()
        .filter(|message| message.role != UnifiedRole::System)
        .map(|message| {
            let role = if message.role == UnifiedRole::Assistant { "model" } else { "user" };
            serde_json::json!({"role": role, "parts": [{"text": message.content.as_text()}]})
        })
        .collect();

    let mut body = serde_json::json!({ "contents": contents });
    if let Some(system) = &input.system {
        body["systemInstruction"] = serde_json::json!({"parts": [{"text": system}]});
    }

    let mut generation_config = serde_json::Map::new();
    if let Some(v) = input.max_tokens { generation_config.insert("maxOutputTokens".to_string(), serde_json::json!(v)); }
    if let Some(v) = input.temperature { generation_config.insert("temperature".to_string(), serde_json::json!(v)); }
    if let Some(v) = input.top_p { generation_config.insert("topP".to_string(), serde_json::json!(v)); }
    if let Some(v) = input.top_k { generation_config.insert("topK".to_string(), serde_json::json!(v)); }
    if let Some(v) = &input.stop_sequences { generation_config.insert("stopSequences".to_string(), serde_json::json!(v)); }
    if !generation_config.is_empty() {
        body["generationConfig"] = serde_json::Value::Object(generation_config);
    }
    body
}

fn text_from_candidate(candidate: &serde_json::Value) -> String {
    candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect::<Vec<_>>().join(""))
        .unwrap_or_default()
}

fn finish_reason_from_gemini(value: &str) -> Option<UnifiedFinishReason> {
    match value {
        "STOP" => Some(UnifiedFinishReason::Stop),
        "MAX_TOKENS" => Some(UnifiedFinishReason::Length),
        "SAFETY" | "RECITATION" => Some(UnifiedFinishReason::ContentFilter),
        _ => None,
    }
}

fn parse_gemini_response(value: serde_json::Value, model_requested: &str, latency_ms: u64) -> Result<UnifiedResponse, ErrorField> {
    let candidate = value["candidates"].get(0).cloned().ok_or_else(|| gw_error::internal("Gemini response had no candidates"))?;
    let text = text_from_candidate(&candidate);
    let finish_reason = candidate["finishReason"].as_str().and_then(finish_reason_from_gemini);

    let usage = &value["usageMetadata"];
    Ok(UnifiedResponse {
        id: uuid::Uuid::new_v4().to_string(),
        model: model_requested.to_string(),
        choices: vec![UnifiedChoice {
            index: 0,
            message: UnifiedMessage {
                role: UnifiedRole::Assistant,
                content: UnifiedContentContainer::Text(text),
                tool_calls: None,
                tool_call_id: None,
            },
            finish_reason,
        }],
        usage: UnifiedUsage {
            prompt_tokens: usage["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
            total_tokens: usage["totalTokenCount"].as_u64().unwrap_or(0) as u32,
            audio_tokens: None,
            reasoning_tokens: None,
        },
        created: 0,
        stop_reason: None,
        stop_sequence: None,
        provider: "google".to_string(),
        model_requested: model_requested.to_string(),
        latency_ms,
        extra_fields: Default::default(),
    })
}

fn gemini_chunk_to_unified(value: serde_json::Value, model: &str) -> UnifiedChunk {
    let candidate = &value["candidates"][0];
    let text = text_from_candidate(candidate);
    let finish_reason = candidate["finishReason"].as_str().and_then(finish_reason_from_gemini);

    UnifiedChunk {
        id: String::new(),
        model: model.to_string(),
        choices: vec![UnifiedChoiceDelta {
            index: 0,
            delta: UnifiedMessageDelta { role: None, content: Some(text), tool_calls: None },
            finish_reason,
        }],
        usage: None,
        created: 0,
    }
}

#[async_trait]
impl ProviderTransport for GoogleTransport {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Google
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
            UnifiedRequestPayload::Chat(input) if input.stream => Ok(ProviderOutcome::Stream(self.generate_stream(model, account, base_url, input, ctx).await?)),
            UnifiedRequestPayload::Chat(input) => Ok(boxed_response(self.generate(model, account, base_url, input, ctx).await?)),
            _ => Err(ErrorField::unsupported_operation("google transport only implements chat")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_hoists_system_instruction() {
        let input = ChatInput {
            messages: vec![UnifiedMessage::text(UnifiedRole::User, "hi")],
            system: Some("be terse".to_string()),
            max_tokens: None,
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
        let body = gemini_request(&input);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[test]
    fn finish_reason_maps_safety_to_content_filter() {
        assert_eq!(finish_reason_from_gemini("SAFETY"), Some(UnifiedFinishReason::ContentFilter));
    }
}
