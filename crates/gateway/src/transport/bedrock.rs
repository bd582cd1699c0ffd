//! AWS Bedrock transport via the Converse API, which gives a single wire
//! shape across every model family (Anthropic, Amazon, Meta, Mistral,
//! Cohere, AI21) Bedrock hosts.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::error::ProvideErrorMetadata;
use aws_sdk_bedrockruntime::types::{ContentBlock, ConversationRole, InferenceConfiguration, Message as BedrockMessage, SystemContentBlock};
use aws_smithy_runtime_api::client::result::SdkError;
use config::ProviderType;
use context::RequestContext;
use schema::chunk::{StreamChunkBody, UnifiedChoiceDelta, UnifiedChunk, UnifiedFunctionDelta, UnifiedMessageDelta};
use schema::message::{UnifiedContentContainer, UnifiedMessage, UnifiedRole};
use schema::request::{ChatInput, UnifiedRequestPayload};
use schema::response::{UnifiedChoice, UnifiedFinishReason, UnifiedResponse, UnifiedUsage};
use schema::ErrorField;

use crate::account::SelectedAccount;
use crate::provider::{ProviderOutcome, ProviderTransport, boxed_response};
use crate::stream::{ChunkStream, Sequencer};

pub struct BedrockTransport {
    client: Client,
}

impl BedrockTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn converse(&self, model: &str, input: &ChatInput) -> Result<UnifiedResponse, ErrorField> {
        let mut request = self
            .client
            .converse()
            .model_id(model)
            .set_messages(Some(to_bedrock_messages(&input.messages)));

        if let Some(system) = &input.system {
            request = request.system(SystemContentBlock::Text(system.clone()));
        }
        request = request.inference_configuration(inference_config(input));

        let output = request.send().await.map_err(map_sdk_error)?;
        let mut text = String::new();
        if let Some(aws_sdk_bedrockruntime::types::ConverseOutput::Message(message)) = &output.output {
            for block in message.content() {
                if let ContentBlock::Text(t) = block {
                    text.push_str(t);
                }
            }
        }

        let stop_reason = output.stop_reason;
        let finish_reason = match stop_reason.as_str() {
            "end_turn" | "stop_sequence" => Some(UnifiedFinishReason::Stop),
            "max_tokens" => Some(UnifiedFinishReason::Length),
            "tool_use" => Some(UnifiedFinishReason::ToolCalls),
            _ => None,
        };

        let usage = output.usage;
        Ok(UnifiedResponse {
            id: uuid::Uuid::new_v4().to_string(),
            model: model.to_string(),
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
                prompt_tokens: usage.as_ref().map(|u| u.input_tokens as u32).unwrap_or(0),
                completion_tokens: usage.as_ref().map(|u| u.output_tokens as u32).unwrap_or(0),
                total_tokens: usage.as_ref().map(|u| u.total_tokens as u32).unwrap_or(0),
                audio_tokens: None,
                reasoning_tokens: None,
            },
            created: 0,
            stop_reason: None,
            stop_sequence: None,
            provider: "bedrock".to_string(),
            model_requested: model.to_string(),
            latency_ms: 0,
            extra_fields: Default::default(),
        })
    }

    async fn converse_stream(&self, model: &str, input: &ChatInput) -> Result<ChunkStream, ErrorField> {
        let mut request = self
            .client
            .converse_stream()
            .model_id(model)
            .set_messages(Some(to_bedrock_messages(&input.messages)));
        if let Some(system) = &input.system {
            request = request.system(SystemContentBlock::Text(system.clone()));
        }
        request = request.inference_configuration(inference_config(input));

        let output = request.send().await.map_err(map_sdk_error)?;
        let mut event_receiver = output.stream;
        let model = model.to_string();
        let sequencer = Sequencer::new("bedrock");

        let chunk_stream = futures::stream::unfold((event_receiver, sequencer, model), |(mut event_receiver, mut sequencer, model)| async move {
            loop {
                match event_receiver.recv().await {
                    Ok(Some(event)) => {
                        use aws_sdk_bedrockruntime::types::ConverseStreamOutput;
                        match event {
                            ConverseStreamOutput::ContentBlockDelta(delta) => {
                                if let Some(aws_sdk_bedrockruntime::types::ContentBlockDelta::Text(text)) = delta.delta {
                                    let chunk = delta_chunk(&model, text);
                                    return Some((Ok(sequencer.stamp(StreamChunkBody::Chat(chunk), false)), (event_receiver, sequencer, model)));
                                }
                            }
                            ConverseStreamOutput::MessageStop(stop) => {
                                let finish_reason = match stop.stop_reason.as_str() {
                                    "max_tokens" => Some(UnifiedFinishReason::Length),
                                    "tool_use" => Some(UnifiedFinishReason::ToolCalls),
                                    _ => Some(UnifiedFinishReason::Stop),
                                };
                                let chunk = UnifiedChunk {
                                    id: String::new(),
                                    model: model.clone(),
                                    choices: vec![UnifiedChoiceDelta { index: 0, delta: UnifiedMessageDelta::default(), finish_reason }],
                                    usage: None,
                                    created: 0,
                                };
                                return Some((Ok(sequencer.stamp(StreamChunkBody::Chat(chunk), true)), (event_receiver, sequencer, model)));
                            }
                            _ => {}
                        }
                    }
                    Ok(None) => return None,
                    Err(err) => return Some((Err(map_sdk_error(err)), (event_receiver, sequencer, model))),
                }
            }
        });

        Ok(Box::pin(chunk_stream))
    }
}

fn delta_chunk(model: &str, text: String) -> UnifiedChunk {
    UnifiedChunk {
        id: String::new(),
        model: model.to_string(),
        choices: vec![UnifiedChoiceDelta {
            index: 0,
            delta: UnifiedMessageDelta { role: None, content: Some(text), tool_calls: None },
            finish_reason: None,
        }],
        usage: None,
        created: 0,
    }
}

fn inference_config(input: &ChatInput) -> InferenceConfiguration {
    InferenceConfiguration::builder()
        .set_max_tokens(input.max_tokens.map(|v| v as i32))
        .set_temperature(input.temperature)
        .set_top_p(input.top_p)
        .set_stop_sequences(input.stop_sequences.clone())
        .build()
}

fn to_bedrock_messages(messages: &[UnifiedMessage]) -> Vec<BedrockMessage> {
    messages
        .iter()
        .filter(|message| message.role != UnifiedRole::System)
        .filter_map(|message| {
            let role = match message.role {
                UnifiedRole::Assistant => ConversationRole::Assistant,
                _ => ConversationRole::User,
            };
            BedrockMessage::builder()
                .role(role)
                .content(ContentBlock::Text(message.content.as_text()))
                .build()
                .ok()
        })
        .collect()
}

fn map_sdk_error<E, R>(error: SdkError<E, R>) -> ErrorField
where
    E: ProvideErrorMetadata + std::fmt::Debug,
    R: std::fmt::Debug,
{
    match &error {
        SdkError::ServiceError(service_error) => {
            let err = service_error.err();
            let message = err.message().unwrap_or("unknown Bedrock error").to_string();
            match err.code() {
                Some("AccessDeniedException") => ErrorField::new(schema::ErrorCategory::Authentication, message),
                Some("ResourceNotFoundException") => ErrorField::new(schema::ErrorCategory::ModelNotFound, message),
                Some("ThrottlingException") => ErrorField::new(schema::ErrorCategory::RateLimited, message),
                Some("ValidationException") => ErrorField::new(schema::ErrorCategory::InvalidRequest, message),
                Some("ModelTimeoutException") => ErrorField::new(schema::ErrorCategory::Timeout, message),
                Some("ServiceUnavailableException") => ErrorField::new(schema::ErrorCategory::ProviderUnavailable, message),
                _ => ErrorField::new(schema::ErrorCategory::Upstream5xx, message),
            }
        }
        _ => ErrorField::new(schema::ErrorCategory::ProviderUnavailable, format!("{error:?}")),
    }
}

#[async_trait]
impl ProviderTransport for BedrockTransport {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Bedrock
    }

    async fn invoke(
        &self,
        model: &str,
        _account: &SelectedAccount,
        _base_url: Option<&str>,
        payload: &UnifiedRequestPayload,
        _ctx: &RequestContext,
    ) -> Result<ProviderOutcome, ErrorField> {
        match payload {
            UnifiedRequestPayload::Chat(input) if input.stream => Ok(ProviderOutcome::Stream(self.converse_stream(model, input).await?)),
            UnifiedRequestPayload::Chat(input) => Ok(boxed_response(self.converse(model, input).await?)),
            _ => Err(ErrorField::unsupported_operation("bedrock transport only implements chat")),
        }
    }
}
