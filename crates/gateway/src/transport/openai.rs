//! OpenAI-compatible wire transport: chat completions, legacy text
//! completions, embeddings, and model listing. Shared verbatim by every
//! `ProviderType` that speaks this wire format (Azure, Cohere, Mistral,
//! Groq, Ollama, and custom endpoints declaring one of those as their
//! `base_provider_type`) — only the base URL and outbound headers differ.

use std::time::Instant;

use async_trait::async_trait;
use config::ProviderType;
use context::RequestContext;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use header_rules::HeaderRule;
use reqwest::{Client, Method, header::AUTHORIZATION};
use schema::chunk::{ResponsesChunk, ResponsesEventType, StreamChunkBody, UnifiedChunk};
use schema::message::{UnifiedContentContainer, UnifiedMessage, UnifiedRole};
use schema::request::{
    BatchCreateInput, BatchListInput, ChatInput, ContainerCreateInput, ContainerFileCreateInput, ContainerScopedIdInput, ContainerScopedListInput, EmbeddingInput,
    EmbeddingTextInput, FileUploadInput, ImageGenerationInput, ResourceIdInput, ResponsesInput, SpeechInput, TextInput, TranscriptionInput, UnifiedRequestPayload,
};
use schema::response::{UnifiedChoice, UnifiedFinishReason, UnifiedResponse, UnifiedUsage};
use schema::{
    ErrorField, ResponseMeta, UnifiedBatch, UnifiedBatchListResponse, UnifiedBatchRequestCounts, UnifiedBatchResponse, UnifiedBatchResultsResponse, UnifiedContainer,
    UnifiedContainerFile, UnifiedContainerFileContentResponse, UnifiedContainerFileListResponse, UnifiedContainerFileResponse, UnifiedContainerListResponse,
    UnifiedContainerResponse, UnifiedDeletedResponse, UnifiedEmbedding, UnifiedEmbeddingResponse, UnifiedFile, UnifiedFileContentResponse, UnifiedFileListResponse,
    UnifiedFileResponse, UnifiedGeneratedImage, UnifiedImageGenerationResponse, UnifiedModel, UnifiedModelsResponse, UnifiedObjectType, UnifiedResponseBody,
    UnifiedSpeechResponse, UnifiedTranscriptionResponse,
};
use secrecy::ExposeSecret;

use crate::account::SelectedAccount;
use crate::error as gw_error;
use crate::provider::{ProviderOutcome, ProviderTransport, boxed_response};
use crate::stream::{ChunkStream, ResponsesStateMachine, Sequencer};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiTransport {
    client: Client,
    provider_type: ProviderType,
    headers: Vec<HeaderRule>,
}

impl OpenAiTransport {
    pub fn new(client: Client, provider_type: ProviderType, headers: Vec<HeaderRule>) -> Self {
        Self { client, provider_type, headers }
    }

    fn base_url<'a>(&self, override_url: Option<&'a str>) -> &'a str {
        override_url.unwrap_or(DEFAULT_BASE_URL)
    }

    fn build_request(&self, method: Method, url: &str, account: &SelectedAccount, ctx: &RequestContext) -> reqwest::RequestBuilder {
        let mut headers = http::HeaderMap::new();
        header_rules::apply(&self.headers, &ctx.headers, &mut headers);

        let mut builder = self.client.request(method, url).headers(headers);
        if !builder_has_auth(&self.headers) {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", account.expose()));
        }
        builder
    }

    async fn chat(&self, model: &str, account: &SelectedAccount, base_url: Option<&str>, input: &ChatInput, ctx: &RequestContext) -> Result<UnifiedResponse, ErrorField> {
        let url = format!("{}/chat/completions", self.base_url(base_url));
        let body = openai_chat_request(model, input, false);

        let started = Instant::now();
        let request = self.build_request(Method::POST, &url, account, ctx).json(&body);
        let response = request.send().await.map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let body: serde_json::Value = response.json().await.map_err(|err| gw_error::from_transport_error(&err))?;
        parse_openai_response(body, model, started.elapsed().as_millis() as u64)
    }

    async fn chat_stream(&self, model: &str, account: &SelectedAccount, base_url: Option<&str>, input: &ChatInput, ctx: &RequestContext) -> Result<ChunkStream, ErrorField> {
        let url = format!("{}/chat/completions", self.base_url(base_url));
        let body = openai_chat_request(model, input, true);

        let request = self.build_request(Method::POST, &url, account, ctx).json(&body);
        let response = request.send().await.map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let provider = self.provider_name();
        let mut sequencer = Sequencer::new(provider);
        let byte_stream = response.bytes_stream();
        let event_stream = byte_stream.eventsource();

        let chunk_stream = event_stream.filter_map(move |event| {
            let result = match event {
                Ok(event) if event.data == "[DONE]" => None,
                Ok(event) => match serde_json::from_str::<serde_json::Value>(&event.data) {
                    Ok(value) => {
                        let finished = value["choices"][0]["finish_reason"].is_string();
                        let chunk = openai_stream_chunk_to_unified(value);
                        Some(Ok(sequencer.stamp(StreamChunkBody::Chat(chunk), finished)))
                    }
                    Err(err) => Some(Err(gw_error::internal(format!("failed to parse OpenAI stream chunk: {err}")))),
                },
                Err(err) => Some(Err(ErrorField::new(schema::ErrorCategory::StreamProtocol, err.to_string()))),
            };
            async move { result }
        });

        Ok(Box::pin(chunk_stream))
    }

    async fn embedding(&self, model: &str, account: &SelectedAccount, base_url: Option<&str>, input: &EmbeddingInput, ctx: &RequestContext) -> Result<UnifiedEmbeddingResponse, ErrorField> {
        let url = format!("{}/embeddings", self.base_url(base_url));
        let wire_input = match &input.input {
            EmbeddingTextInput::One(text) => serde_json::json!(text),
            EmbeddingTextInput::Many(texts) => serde_json::json!(texts),
        };
        let body = serde_json::json!({
            "model": model,
            "input": wire_input,
            "dimensions": input.dimensions,
            "encoding_format": input.encoding_format,
        });

        let started = Instant::now();
        let value = self.send_json(Method::POST, &url, account, ctx, Some(body)).await?;
        let usage = &value["usage"];
        let embeddings = value["data"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|entry| UnifiedEmbedding {
                index: entry["index"].as_u64().unwrap_or(0) as u32,
                vector: entry["embedding"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .map(|v| v as f32)
                    .collect(),
            })
            .collect();

        Ok(UnifiedEmbeddingResponse {
            model: model.to_string(),
            embeddings,
            usage: UnifiedUsage {
                prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: 0,
                total_tokens: usage["total_tokens"].as_u64().unwrap_or(0) as u32,
                audio_tokens: None,
                reasoning_tokens: None,
            },
            meta: self.meta(model.to_string(), started.elapsed().as_millis() as u64),
        })
    }

    async fn responses(&self, model: &str, account: &SelectedAccount, base_url: Option<&str>, input: &ResponsesInput, ctx: &RequestContext) -> Result<UnifiedResponse, ErrorField> {
        let url = format!("{}/responses", self.base_url(base_url));
        let body = openai_responses_request(model, input, false);

        let started = Instant::now();
        let value = self.send_json(Method::POST, &url, account, ctx, Some(body)).await?;
        parse_openai_responses_body(value, model, started.elapsed().as_millis() as u64)
    }

    async fn responses_stream(
        &self,
        model: &str,
        account: &SelectedAccount,
        base_url: Option<&str>,
        input: &ResponsesInput,
        ctx: &RequestContext,
    ) -> Result<ChunkStream, ErrorField> {
        let url = format!("{}/responses", self.base_url(base_url));
        let body = openai_responses_request(model, input, true);

        let request = self.build_request(Method::POST, &url, account, ctx).json(&body);
        let response = request.send().await.map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let provider = self.provider_name();
        let mut sequencer = Sequencer::new(provider);
        let mut machine = ResponsesStateMachine::new();
        let byte_stream = response.bytes_stream();
        let event_stream = byte_stream.eventsource();

        let chunk_stream = event_stream.filter_map(move |event| {
            let result = match event {
                Ok(event) if event.data == "[DONE]" => None,
                Ok(event) => match serde_json::from_str::<serde_json::Value>(&event.data) {
                    Ok(value) => {
                        let kind = value["type"].as_str().unwrap_or_default();
                        match responses_event_type_from_wire(kind) {
                            Some(event_type) => match machine.advance(event_type) {
                                Err(err) => Some(Ok(sequencer.stamp(StreamChunkBody::Error(schema::chunk::ErrorChunk { error: err }), true))),
                                Ok(()) => {
                                    let terminal = matches!(event_type, ResponsesEventType::Completed | ResponsesEventType::Error);
                                    let chunk = ResponsesChunk {
                                        event_type,
                                        item_id: value["item_id"].as_str().or_else(|| value["item"]["id"].as_str()).map(str::to_string),
                                        content_index: value["content_index"].as_u64().map(|v| v as u32),
                                        delta: value["delta"].as_str().map(str::to_string),
                                        usage: matches!(event_type, ResponsesEventType::Completed).then(|| parse_usage_value(&value["response"]["usage"])),
                                    };
                                    Some(Ok(sequencer.stamp(StreamChunkBody::Responses(chunk), terminal)))
                                }
                            },
                            None => None,
                        }
                    }
                    Err(err) => Some(Err(gw_error::internal(format!("failed to parse responses stream chunk: {err}")))),
                },
                Err(err) => Some(Err(ErrorField::new(schema::ErrorCategory::StreamProtocol, err.to_string()))),
            };
            async move { result }
        });

        Ok(Box::pin(chunk_stream))
    }

    async fn speech(&self, model: &str, account: &SelectedAccount, base_url: Option<&str>, input: &SpeechInput, ctx: &RequestContext) -> Result<UnifiedSpeechResponse, ErrorField> {
        let url = format!("{}/audio/speech", self.base_url(base_url));
        let format = input.format.clone().unwrap_or_else(|| "mp3".to_string());
        let body = serde_json::json!({
            "model": model,
            "input": input.text,
            "voice": input.voice,
            "response_format": format,
            "speed": input.speed,
        });

        let started = Instant::now();
        let response = self
            .build_request(Method::POST, &url, account, ctx)
            .json(&body)
            .send()
            .await
            .map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let audio = response.bytes().await.map_err(|err| gw_error::from_transport_error(&err))?.to_vec();
        Ok(UnifiedSpeechResponse { audio, format, meta: self.meta(model.to_string(), started.elapsed().as_millis() as u64) })
    }

    async fn transcription(
        &self,
        model: &str,
        account: &SelectedAccount,
        base_url: Option<&str>,
        input: &TranscriptionInput,
        ctx: &RequestContext,
    ) -> Result<UnifiedTranscriptionResponse, ErrorField> {
        let url = format!("{}/audio/transcriptions", self.base_url(base_url));
        let part = reqwest::multipart::Part::bytes(input.audio.clone()).file_name(input.filename.clone());
        let mut form = reqwest::multipart::Form::new().text("model", model.to_string()).part("file", part);
        if let Some(language) = &input.language {
            form = form.text("language", language.clone());
        }
        if let Some(prompt) = &input.prompt {
            form = form.text("prompt", prompt.clone());
        }

        let started = Instant::now();
        let response = self
            .build_request(Method::POST, &url, account, ctx)
            .multipart(form)
            .send()
            .await
            .map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let value: serde_json::Value = response.json().await.map_err(|err| gw_error::from_transport_error(&err))?;
        Ok(UnifiedTranscriptionResponse {
            text: value["text"].as_str().unwrap_or_default().to_string(),
            language: value["language"].as_str().map(str::to_string),
            meta: self.meta(model.to_string(), started.elapsed().as_millis() as u64),
        })
    }

    async fn image_generation(
        &self,
        model: &str,
        account: &SelectedAccount,
        base_url: Option<&str>,
        input: &ImageGenerationInput,
        ctx: &RequestContext,
    ) -> Result<UnifiedImageGenerationResponse, ErrorField> {
        let url = format!("{}/images/generations", self.base_url(base_url));
        let body = serde_json::json!({
            "model": model,
            "prompt": input.prompt,
            "size": input.size,
            "n": input.n,
            "quality": input.quality,
        });

        let started = Instant::now();
        let value = self.send_json(Method::POST, &url, account, ctx, Some(body)).await?;
        let images = value["data"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|entry| UnifiedGeneratedImage {
                b64_json: entry["b64_json"].as_str().map(str::to_string),
                url: entry["url"].as_str().map(str::to_string),
            })
            .collect();

        Ok(UnifiedImageGenerationResponse { images, meta: self.meta(model.to_string(), started.elapsed().as_millis() as u64) })
    }

    async fn batch_create(&self, account: &SelectedAccount, base_url: Option<&str>, input: &BatchCreateInput, ctx: &RequestContext) -> Result<UnifiedBatchResponse, ErrorField> {
        let url = format!("{}/batches", self.base_url(base_url));
        let body = serde_json::json!({
            "input_file_id": input.input_file_id,
            "endpoint": input.endpoint,
            "completion_window": input.completion_window.clone().unwrap_or_else(|| "24h".to_string()),
            "metadata": input.metadata,
        });

        let started = Instant::now();
        let value = self.send_json(Method::POST, &url, account, ctx, Some(body)).await?;
        Ok(UnifiedBatchResponse { batch: parse_batch(&value), meta: self.meta(String::new(), started.elapsed().as_millis() as u64) })
    }

    async fn batch_list(&self, account: &SelectedAccount, base_url: Option<&str>, input: &BatchListInput, ctx: &RequestContext) -> Result<UnifiedBatchListResponse, ErrorField> {
        let url = format!("{}/batches{}", self.base_url(base_url), list_query(input.limit, input.after.as_deref()));

        let started = Instant::now();
        let value = self.send_json(Method::GET, &url, account, ctx, None).await?;
        let batches = value["data"].as_array().cloned().unwrap_or_default().iter().map(parse_batch).collect();
        Ok(UnifiedBatchListResponse {
            batches,
            has_more: value["has_more"].as_bool().unwrap_or(false),
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn batch_retrieve(&self, account: &SelectedAccount, base_url: Option<&str>, input: &ResourceIdInput, ctx: &RequestContext) -> Result<UnifiedBatchResponse, ErrorField> {
        let url = format!("{}/batches/{}", self.base_url(base_url), input.id);

        let started = Instant::now();
        let value = self.send_json(Method::GET, &url, account, ctx, None).await?;
        Ok(UnifiedBatchResponse { batch: parse_batch(&value), meta: self.meta(String::new(), started.elapsed().as_millis() as u64) })
    }

    async fn batch_cancel(&self, account: &SelectedAccount, base_url: Option<&str>, input: &ResourceIdInput, ctx: &RequestContext) -> Result<UnifiedBatchResponse, ErrorField> {
        let url = format!("{}/batches/{}/cancel", self.base_url(base_url), input.id);

        let started = Instant::now();
        let value = self.send_json(Method::POST, &url, account, ctx, None).await?;
        Ok(UnifiedBatchResponse { batch: parse_batch(&value), meta: self.meta(String::new(), started.elapsed().as_millis() as u64) })
    }

    async fn batch_results(&self, account: &SelectedAccount, base_url: Option<&str>, input: &ResourceIdInput, ctx: &RequestContext) -> Result<UnifiedBatchResultsResponse, ErrorField> {
        let started = Instant::now();
        let batch_response = self.batch_retrieve(account, base_url, input, ctx).await?;
        let output_file_id = batch_response
            .batch
            .output_file_id
            .ok_or_else(|| ErrorField::new(schema::ErrorCategory::InvalidRequest, format!("batch '{}' has no output file yet", input.id)))?;

        let content = self.fetch_file_bytes(&output_file_id, account, base_url, ctx).await?;
        Ok(UnifiedBatchResultsResponse {
            batch_id: input.id.clone(),
            content,
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn fetch_file_bytes(&self, file_id: &str, account: &SelectedAccount, base_url: Option<&str>, ctx: &RequestContext) -> Result<Vec<u8>, ErrorField> {
        let url = format!("{}/files/{file_id}/content", self.base_url(base_url));
        let response = self
            .build_request(Method::GET, &url, account, ctx)
            .send()
            .await
            .map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }
        Ok(response.bytes().await.map_err(|err| gw_error::from_transport_error(&err))?.to_vec())
    }

    async fn file_upload(&self, account: &SelectedAccount, base_url: Option<&str>, input: &FileUploadInput, ctx: &RequestContext) -> Result<UnifiedFileResponse, ErrorField> {
        let url = format!("{}/files", self.base_url(base_url));
        let part = reqwest::multipart::Part::bytes(input.content.clone()).file_name(input.filename.clone());
        let form = reqwest::multipart::Form::new().text("purpose", input.purpose.clone()).part("file", part);

        let started = Instant::now();
        let response = self
            .build_request(Method::POST, &url, account, ctx)
            .multipart(form)
            .send()
            .await
            .map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let value: serde_json::Value = response.json().await.map_err(|err| gw_error::from_transport_error(&err))?;
        Ok(UnifiedFileResponse { file: parse_file(&value), meta: self.meta(String::new(), started.elapsed().as_millis() as u64) })
    }

    async fn file_list(&self, account: &SelectedAccount, base_url: Option<&str>, input: &BatchListInput, ctx: &RequestContext) -> Result<UnifiedFileListResponse, ErrorField> {
        let url = format!("{}/files{}", self.base_url(base_url), list_query(input.limit, input.after.as_deref()));

        let started = Instant::now();
        let value = self.send_json(Method::GET, &url, account, ctx, None).await?;
        let files = value["data"].as_array().cloned().unwrap_or_default().iter().map(parse_file).collect();
        Ok(UnifiedFileListResponse {
            files,
            has_more: value["has_more"].as_bool().unwrap_or(false),
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn file_retrieve(&self, account: &SelectedAccount, base_url: Option<&str>, input: &ResourceIdInput, ctx: &RequestContext) -> Result<UnifiedFileResponse, ErrorField> {
        let url = format!("{}/files/{}", self.base_url(base_url), input.id);

        let started = Instant::now();
        let value = self.send_json(Method::GET, &url, account, ctx, None).await?;
        Ok(UnifiedFileResponse { file: parse_file(&value), meta: self.meta(String::new(), started.elapsed().as_millis() as u64) })
    }

    async fn file_delete(&self, account: &SelectedAccount, base_url: Option<&str>, input: &ResourceIdInput, ctx: &RequestContext) -> Result<UnifiedDeletedResponse, ErrorField> {
        let url = format!("{}/files/{}", self.base_url(base_url), input.id);

        let started = Instant::now();
        let value = self.send_json(Method::DELETE, &url, account, ctx, None).await?;
        Ok(UnifiedDeletedResponse {
            id: value["id"].as_str().unwrap_or(&input.id).to_string(),
            deleted: value["deleted"].as_bool().unwrap_or(true),
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn file_content(&self, account: &SelectedAccount, base_url: Option<&str>, input: &ResourceIdInput, ctx: &RequestContext) -> Result<UnifiedFileContentResponse, ErrorField> {
        let started = Instant::now();
        let content = self.fetch_file_bytes(&input.id, account, base_url, ctx).await?;
        let file = self.file_retrieve(account, base_url, input, ctx).await?;
        Ok(UnifiedFileContentResponse {
            filename: file.file.filename,
            content,
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn container_create(&self, account: &SelectedAccount, base_url: Option<&str>, input: &ContainerCreateInput, ctx: &RequestContext) -> Result<UnifiedContainerResponse, ErrorField> {
        let url = format!("{}/containers", self.base_url(base_url));
        let body = serde_json::json!({ "name": input.name, "file_ids": input.file_ids });

        let started = Instant::now();
        let value = self.send_json(Method::POST, &url, account, ctx, Some(body)).await?;
        Ok(UnifiedContainerResponse { container: parse_container(&value), meta: self.meta(String::new(), started.elapsed().as_millis() as u64) })
    }

    async fn container_list(&self, account: &SelectedAccount, base_url: Option<&str>, input: &BatchListInput, ctx: &RequestContext) -> Result<UnifiedContainerListResponse, ErrorField> {
        let url = format!("{}/containers{}", self.base_url(base_url), list_query(input.limit, input.after.as_deref()));

        let started = Instant::now();
        let value = self.send_json(Method::GET, &url, account, ctx, None).await?;
        let containers = value["data"].as_array().cloned().unwrap_or_default().iter().map(parse_container).collect();
        Ok(UnifiedContainerListResponse {
            containers,
            has_more: value["has_more"].as_bool().unwrap_or(false),
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn container_retrieve(&self, account: &SelectedAccount, base_url: Option<&str>, input: &ResourceIdInput, ctx: &RequestContext) -> Result<UnifiedContainerResponse, ErrorField> {
        let url = format!("{}/containers/{}", self.base_url(base_url), input.id);

        let started = Instant::now();
        let value = self.send_json(Method::GET, &url, account, ctx, None).await?;
        Ok(UnifiedContainerResponse { container: parse_container(&value), meta: self.meta(String::new(), started.elapsed().as_millis() as u64) })
    }

    async fn container_delete(&self, account: &SelectedAccount, base_url: Option<&str>, input: &ResourceIdInput, ctx: &RequestContext) -> Result<UnifiedDeletedResponse, ErrorField> {
        let url = format!("{}/containers/{}", self.base_url(base_url), input.id);

        let started = Instant::now();
        let value = self.send_json(Method::DELETE, &url, account, ctx, None).await?;
        Ok(UnifiedDeletedResponse {
            id: value["id"].as_str().unwrap_or(&input.id).to_string(),
            deleted: value["deleted"].as_bool().unwrap_or(true),
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn container_file_create(
        &self,
        account: &SelectedAccount,
        base_url: Option<&str>,
        input: &ContainerFileCreateInput,
        ctx: &RequestContext,
    ) -> Result<UnifiedContainerFileResponse, ErrorField> {
        let url = format!("{}/containers/{}/files", self.base_url(base_url), input.container_id);
        let part = reqwest::multipart::Part::bytes(input.content.clone()).file_name(input.filename.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let started = Instant::now();
        let response = self
            .build_request(Method::POST, &url, account, ctx)
            .multipart(form)
            .send()
            .await
            .map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let value: serde_json::Value = response.json().await.map_err(|err| gw_error::from_transport_error(&err))?;
        Ok(UnifiedContainerFileResponse {
            file: parse_container_file(&value, &input.container_id),
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn container_file_list(
        &self,
        account: &SelectedAccount,
        base_url: Option<&str>,
        input: &ContainerScopedListInput,
        ctx: &RequestContext,
    ) -> Result<UnifiedContainerFileListResponse, ErrorField> {
        let url = format!("{}/containers/{}/files{}", self.base_url(base_url), input.container_id, list_query(input.limit, None));

        let started = Instant::now();
        let value = self.send_json(Method::GET, &url, account, ctx, None).await?;
        let files = value["data"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|entry| parse_container_file(entry, &input.container_id))
            .collect();
        Ok(UnifiedContainerFileListResponse {
            files,
            has_more: value["has_more"].as_bool().unwrap_or(false),
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn container_file_retrieve(
        &self,
        account: &SelectedAccount,
        base_url: Option<&str>,
        input: &ContainerScopedIdInput,
        ctx: &RequestContext,
    ) -> Result<UnifiedContainerFileResponse, ErrorField> {
        let url = format!("{}/containers/{}/files/{}", self.base_url(base_url), input.container_id, input.file_id);

        let started = Instant::now();
        let value = self.send_json(Method::GET, &url, account, ctx, None).await?;
        Ok(UnifiedContainerFileResponse {
            file: parse_container_file(&value, &input.container_id),
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn container_file_content(
        &self,
        account: &SelectedAccount,
        base_url: Option<&str>,
        input: &ContainerScopedIdInput,
        ctx: &RequestContext,
    ) -> Result<UnifiedContainerFileContentResponse, ErrorField> {
        let started = Instant::now();
        let url = format!("{}/containers/{}/files/{}/content", self.base_url(base_url), input.container_id, input.file_id);
        let response = self
            .build_request(Method::GET, &url, account, ctx)
            .send()
            .await
            .map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }
        let content = response.bytes().await.map_err(|err| gw_error::from_transport_error(&err))?.to_vec();
        let file = self.container_file_retrieve(account, base_url, input, ctx).await?;
        Ok(UnifiedContainerFileContentResponse {
            filename: file.file.filename,
            content,
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    async fn container_file_delete(
        &self,
        account: &SelectedAccount,
        base_url: Option<&str>,
        input: &ContainerScopedIdInput,
        ctx: &RequestContext,
    ) -> Result<UnifiedDeletedResponse, ErrorField> {
        let url = format!("{}/containers/{}/files/{}", self.base_url(base_url), input.container_id, input.file_id);

        let started = Instant::now();
        let value = self.send_json(Method::DELETE, &url, account, ctx, None).await?;
        Ok(UnifiedDeletedResponse {
            id: value["id"].as_str().unwrap_or(&input.file_id).to_string(),
            deleted: value["deleted"].as_bool().unwrap_or(true),
            meta: self.meta(String::new(), started.elapsed().as_millis() as u64),
        })
    }

    /// Sends one JSON request and decodes the body, collapsing the
    /// send/status-check/decode boilerplate every admin operation above
    /// repeats for its own shape of response.
    async fn send_json(&self, method: Method, url: &str, account: &SelectedAccount, ctx: &RequestContext, body: Option<serde_json::Value>) -> Result<serde_json::Value, ErrorField> {
        let mut request = self.build_request(method, url, account, ctx);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }
        response.json().await.map_err(|err| gw_error::from_transport_error(&err))
    }

    fn meta(&self, model_requested: String, latency_ms: u64) -> ResponseMeta {
        ResponseMeta { provider: self.provider_name().to_string(), model_requested, latency_ms }
    }

    fn provider_name(&self) -> &'static str {
        match self.provider_type {
            ProviderType::Azure => "azure",
            ProviderType::Cohere => "cohere",
            ProviderType::Mistral => "mistral",
            ProviderType::Groq => "groq",
            ProviderType::Ollama => "ollama",
            _ => "openai",
        }
    }
}

fn builder_has_auth(headers: &[HeaderRule]) -> bool {
    headers.iter().any(|rule| matches!(rule, HeaderRule::Insert(insert) if insert.name.eq_ignore_ascii_case("authorization")))
}

#[async_trait]
impl ProviderTransport for OpenAiTransport {
    fn provider_type(&self) -> ProviderType {
        self.provider_type
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
            UnifiedRequestPayload::Chat(input) if input.stream => Ok(ProviderOutcome::Stream(self.chat_stream(model, account, base_url, input, ctx).await?)),
            UnifiedRequestPayload::Chat(input) => Ok(boxed_response(self.chat(model, account, base_url, input, ctx).await?)),
            UnifiedRequestPayload::Text(input) => Ok(boxed_response(self.chat(model, account, base_url, &chat_input_from_text(input), ctx).await?)),
            UnifiedRequestPayload::Responses(input) if input.stream => Ok(ProviderOutcome::Stream(self.responses_stream(model, account, base_url, input, ctx).await?)),
            UnifiedRequestPayload::Responses(input) => Ok(boxed_response(self.responses(model, account, base_url, input, ctx).await?)),
            UnifiedRequestPayload::Embedding(input) => Ok(boxed_response(self.embedding(model, account, base_url, input, ctx).await?)),
            UnifiedRequestPayload::Speech(input) => Ok(boxed_response(UnifiedResponseBody::Speech(self.speech(model, account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::Transcription(input) => {
                Ok(boxed_response(UnifiedResponseBody::Transcription(self.transcription(model, account, base_url, input, ctx).await?)))
            }
            UnifiedRequestPayload::ImageGeneration(input) => {
                Ok(boxed_response(UnifiedResponseBody::ImageGeneration(self.image_generation(model, account, base_url, input, ctx).await?)))
            }
            UnifiedRequestPayload::BatchCreate(input) => Ok(boxed_response(UnifiedResponseBody::Batch(self.batch_create(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::BatchList(input) => Ok(boxed_response(UnifiedResponseBody::BatchList(self.batch_list(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::BatchRetrieve(input) => Ok(boxed_response(UnifiedResponseBody::Batch(self.batch_retrieve(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::BatchCancel(input) => Ok(boxed_response(UnifiedResponseBody::Batch(self.batch_cancel(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::BatchResults(input) => Ok(boxed_response(UnifiedResponseBody::BatchResults(self.batch_results(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::FileUpload(input) => Ok(boxed_response(UnifiedResponseBody::File(self.file_upload(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::FileList(input) => Ok(boxed_response(UnifiedResponseBody::FileList(self.file_list(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::FileRetrieve(input) => Ok(boxed_response(UnifiedResponseBody::File(self.file_retrieve(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::FileDelete(input) => Ok(boxed_response(UnifiedResponseBody::Deleted(self.file_delete(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::FileContent(input) => Ok(boxed_response(UnifiedResponseBody::FileContent(self.file_content(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::ContainerCreate(input) => Ok(boxed_response(UnifiedResponseBody::Container(self.container_create(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::ContainerList(input) => Ok(boxed_response(UnifiedResponseBody::ContainerList(self.container_list(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::ContainerRetrieve(input) => {
                Ok(boxed_response(UnifiedResponseBody::Container(self.container_retrieve(account, base_url, input, ctx).await?)))
            }
            UnifiedRequestPayload::ContainerDelete(input) => Ok(boxed_response(UnifiedResponseBody::Deleted(self.container_delete(account, base_url, input, ctx).await?))),
            UnifiedRequestPayload::ContainerFileCreate(input) => {
                Ok(boxed_response(UnifiedResponseBody::ContainerFile(self.container_file_create(account, base_url, input, ctx).await?)))
            }
            UnifiedRequestPayload::ContainerFileList(input) => {
                Ok(boxed_response(UnifiedResponseBody::ContainerFileList(self.container_file_list(account, base_url, input, ctx).await?)))
            }
            UnifiedRequestPayload::ContainerFileRetrieve(input) => {
                Ok(boxed_response(UnifiedResponseBody::ContainerFile(self.container_file_retrieve(account, base_url, input, ctx).await?)))
            }
            UnifiedRequestPayload::ContainerFileContent(input) => {
                Ok(boxed_response(UnifiedResponseBody::ContainerFileContent(self.container_file_content(account, base_url, input, ctx).await?)))
            }
            UnifiedRequestPayload::ContainerFileDelete(input) => {
                Ok(boxed_response(UnifiedResponseBody::Deleted(self.container_file_delete(account, base_url, input, ctx).await?)))
            }
            _ => Err(ErrorField::unsupported_operation(format!("{:?} transport does not implement this operation", self.provider_type))),
        }
    }

    async fn list_models(&self, account: &SelectedAccount, base_url: Option<&str>, ctx: &RequestContext) -> Result<UnifiedModelsResponse, ErrorField> {
        let url = format!("{}/models", self.base_url(base_url));
        let response = self
            .build_request(Method::GET, &url, account, ctx)
            .send()
            .await
            .map_err(|err| gw_error::from_transport_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(gw_error::from_http_status(status.as_u16(), &text, None));
        }

        let value: serde_json::Value = response.json().await.map_err(|err| gw_error::from_transport_error(&err))?;
        let models = value["data"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|entry| UnifiedModel {
                id: entry["id"].as_str().unwrap_or_default().to_string(),
                object_type: UnifiedObjectType::Model,
                display_name: entry["id"].as_str().unwrap_or_default().to_string(),
                created: entry["created"].as_u64().unwrap_or(0),
                owned_by: entry["owned_by"].as_str().unwrap_or("openai").to_string(),
            })
            .collect();

        Ok(UnifiedModelsResponse { object_type: UnifiedObjectType::List, models, has_more: false })
    }
}

fn chat_input_from_text(input: &TextInput) -> ChatInput {
    ChatInput {
        messages: vec![UnifiedMessage::text(UnifiedRole::User, input.prompt.clone())],
        system: None,
        max_tokens: input.max_tokens,
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

fn openai_chat_request(model: &str, input: &ChatInput, stream: bool) -> serde_json::Value {
    let mut messages: Vec<serde_json::Value> = Vec::with_capacity(input.messages.len() + 1);
    if let Some(system) = &input.system {
        messages.push(serde_json::json!({"role": "system", "content": system}));
    }
    for message in &input.messages {
        messages.push(wire_message(message));
    }

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    });
    let object = body.as_object_mut().expect("object literal");
    if let Some(v) = input.max_tokens { object.insert("max_tokens".to_string(), serde_json::json!(v)); }
    if let Some(v) = input.temperature { object.insert("temperature".to_string(), serde_json::json!(v)); }
    if let Some(v) = input.top_p { object.insert("top_p".to_string(), serde_json::json!(v)); }
    if let Some(v) = &input.stop_sequences { object.insert("stop".to_string(), serde_json::json!(v)); }
    if let Some(v) = &input.tools { object.insert("tools".to_string(), serde_json::json!(v)); }
    if let Some(v) = &input.tool_choice { object.insert("tool_choice".to_string(), serde_json::json!(v)); }
    if let Some(v) = input.parallel_tool_calls { object.insert("parallel_tool_calls".to_string(), serde_json::json!(v)); }
    body
}

fn wire_message(message: &UnifiedMessage) -> serde_json::Value {
    let role = match message.role {
        UnifiedRole::System => "system",
        UnifiedRole::User => "user",
        UnifiedRole::Assistant => "assistant",
        UnifiedRole::Tool => "tool",
    };
    let content = match &message.content {
        UnifiedContentContainer::Text(text) => serde_json::json!(text),
        UnifiedContentContainer::Blocks(_) => serde_json::json!(message.content.as_text()),
    };
    let mut value = serde_json::json!({"role": role, "content": content});
    if let Some(tool_calls) = &message.tool_calls {
        value["tool_calls"] = serde_json::json!(tool_calls);
    }
    if let Some(tool_call_id) = &message.tool_call_id {
        value["tool_call_id"] = serde_json::json!(tool_call_id);
    }
    value
}

fn parse_openai_response(value: serde_json::Value, model_requested: &str, latency_ms: u64) -> Result<UnifiedResponse, ErrorField> {
    let id = value["id"].as_str().unwrap_or_default().to_string();
    let model = value["model"].as_str().unwrap_or(model_requested).to_string();
    let created = value["created"].as_u64().unwrap_or(0);

    let choices = value["choices"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|choice| {
            let message = &choice["message"];
            let content = message["content"].as_str().unwrap_or_default().to_string();
            let tool_calls = message["tool_calls"].as_array().map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        Some(schema::UnifiedToolCall {
                            id: call["id"].as_str()?.to_string(),
                            function: schema::UnifiedFunctionCall {
                                name: call["function"]["name"].as_str()?.to_string(),
                                arguments: schema::UnifiedArguments::String(call["function"]["arguments"].as_str().unwrap_or_default().to_string()),
                            },
                        })
                    })
                    .collect::<Vec<_>>()
            });

            UnifiedChoice {
                index: choice["index"].as_u64().unwrap_or(0) as u32,
                message: UnifiedMessage {
                    role: UnifiedRole::Assistant,
                    content: UnifiedContentContainer::Text(content),
                    tool_calls,
                    tool_call_id: None,
                },
                finish_reason: choice["finish_reason"].as_str().and_then(finish_reason_from_str),
            }
        })
        .collect();

    let usage = &value["usage"];
    Ok(UnifiedResponse {
        id,
        model: model.clone(),
        choices,
        usage: UnifiedUsage {
            prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: usage["total_tokens"].as_u64().unwrap_or(0) as u32,
            audio_tokens: None,
            reasoning_tokens: usage["completion_tokens_details"]["reasoning_tokens"].as_u64().map(|v| v as u32),
        },
        created,
        stop_reason: None,
        stop_sequence: None,
        provider: "openai".to_string(),
        model_requested: model_requested.to_string(),
        latency_ms,
        extra_fields: Default::default(),
    })
}

fn finish_reason_from_str(value: &str) -> Option<UnifiedFinishReason> {
    match value {
        "stop" => Some(UnifiedFinishReason::Stop),
        "length" | "max_tokens" => Some(UnifiedFinishReason::Length),
        "content_filter" => Some(UnifiedFinishReason::ContentFilter),
        "tool_calls" => Some(UnifiedFinishReason::ToolCalls),
        _ => None,
    }
}

fn openai_stream_chunk_to_unified(value: serde_json::Value) -> UnifiedChunk {
    use schema::chunk::{UnifiedChoiceDelta, UnifiedFunctionDelta, UnifiedFunctionStart, UnifiedMessageDelta, UnifiedStreamingToolCall};

    let choices = value["choices"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|choice| {
            let delta = &choice["delta"];
            let tool_calls = delta["tool_calls"].as_array().map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        let index = call["index"].as_u64()? as usize;
                        let function = &call["function"];
                        let arguments = function["arguments"].as_str().unwrap_or_default().to_string();
                        if let Some(id) = call["id"].as_str() {
                            Some(UnifiedStreamingToolCall::Start {
                                index,
                                id: id.to_string(),
                                function: UnifiedFunctionStart { name: function["name"].as_str().unwrap_or_default().to_string(), arguments },
                            })
                        } else {
                            Some(UnifiedStreamingToolCall::Delta { index, function: UnifiedFunctionDelta { arguments } })
                        }
                    })
                    .collect::<Vec<_>>()
            });

            UnifiedChoiceDelta {
                index: choice["index"].as_u64().unwrap_or(0) as u32,
                delta: UnifiedMessageDelta {
                    role: None,
                    content: delta["content"].as_str().map(str::to_string),
                    tool_calls,
                },
                finish_reason: choice["finish_reason"].as_str().and_then(finish_reason_from_str),
            }
        })
        .collect();

    UnifiedChunk {
        id: value["id"].as_str().unwrap_or_default().to_string(),
        model: value["model"].as_str().unwrap_or_default().to_string(),
        choices,
        usage: None,
        created: value["created"].as_u64().unwrap_or(0),
    }
}

fn openai_responses_request(model: &str, input: &ResponsesInput, stream: bool) -> serde_json::Value {
    let items: Vec<serde_json::Value> = input.messages.iter().map(wire_message).collect();

    let mut body = serde_json::json!({
        "model": model,
        "input": items,
        "stream": stream,
    });
    let object = body.as_object_mut().expect("object literal");
    if let Some(v) = &input.instructions {
        object.insert("instructions".to_string(), serde_json::json!(v));
    }
    if let Some(v) = input.max_output_tokens {
        object.insert("max_output_tokens".to_string(), serde_json::json!(v));
    }
    if let Some(v) = input.temperature {
        object.insert("temperature".to_string(), serde_json::json!(v));
    }
    if let Some(v) = &input.tools {
        object.insert("tools".to_string(), serde_json::json!(v));
    }
    if let Some(v) = &input.tool_choice {
        object.insert("tool_choice".to_string(), serde_json::json!(v));
    }
    if input.reasoning_summary {
        object.insert("reasoning".to_string(), serde_json::json!({"summary": "auto"}));
    }
    body
}

/// Parses a non-streaming responses-API body into the same chat-shaped
/// response a caller gets back from `/chat/completions`: the output items'
/// text is concatenated into one assistant message, and any `function_call`
/// output items become tool calls on that message.
fn parse_openai_responses_body(value: serde_json::Value, model_requested: &str, latency_ms: u64) -> Result<UnifiedResponse, ErrorField> {
    let id = value["id"].as_str().unwrap_or_default().to_string();
    let model = value["model"].as_str().unwrap_or(model_requested).to_string();
    let created = value["created_at"].as_u64().unwrap_or(0);

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for item in value["output"].as_array().cloned().unwrap_or_default() {
        match item["type"].as_str() {
            Some("message") => {
                for part in item["content"].as_array().cloned().unwrap_or_default() {
                    if let Some(part_text) = part["text"].as_str() {
                        text.push_str(part_text);
                    }
                }
            }
            Some("function_call") => {
                if let (Some(call_id), Some(name)) = (item["call_id"].as_str(), item["name"].as_str()) {
                    tool_calls.push(schema::UnifiedToolCall {
                        id: call_id.to_string(),
                        function: schema::UnifiedFunctionCall {
                            name: name.to_string(),
                            arguments: schema::UnifiedArguments::String(item["arguments"].as_str().unwrap_or_default().to_string()),
                        },
                    });
                }
            }
            _ => {}
        }
    }

    let finish_reason = if tool_calls.is_empty() { Some(UnifiedFinishReason::Stop) } else { Some(UnifiedFinishReason::ToolCalls) };
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
        usage: parse_usage_value(usage),
        created,
        stop_reason: None,
        stop_sequence: None,
        provider: "openai".to_string(),
        model_requested: model_requested.to_string(),
        latency_ms,
        extra_fields: Default::default(),
    })
}

fn parse_usage_value(value: &serde_json::Value) -> UnifiedUsage {
    UnifiedUsage {
        prompt_tokens: value["input_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: value["output_tokens"].as_u64().unwrap_or(0) as u32,
        total_tokens: value["total_tokens"].as_u64().unwrap_or(0) as u32,
        audio_tokens: None,
        reasoning_tokens: None,
    }
}

/// Maps the responses-API SSE `type` field to our closed event set.
/// Event types the wire format emits that we don't model (e.g. provider-
/// specific annotation events) are silently dropped by returning `None`,
/// rather than failing the whole stream over an event we don't need to
/// forward.
fn responses_event_type_from_wire(kind: &str) -> Option<ResponsesEventType> {
    match kind {
        "response.created" => Some(ResponsesEventType::Created),
        "response.in_progress" => Some(ResponsesEventType::InProgress),
        "response.output_item.added" => Some(ResponsesEventType::OutputItemAdded),
        "response.output_item.done" => Some(ResponsesEventType::OutputItemDone),
        "response.content_part.added" => Some(ResponsesEventType::ContentPartAdded),
        "response.content_part.done" => Some(ResponsesEventType::ContentPartDone),
        "response.output_text.delta" => Some(ResponsesEventType::OutputTextDelta),
        "response.output_text.done" => Some(ResponsesEventType::OutputTextDone),
        "response.function_call_arguments.delta" => Some(ResponsesEventType::FunctionCallArgumentsDelta),
        "response.function_call_arguments.done" => Some(ResponsesEventType::FunctionCallArgumentsDone),
        "response.reasoning_summary_part.added" => Some(ResponsesEventType::ReasoningSummaryPartAdded),
        "response.reasoning_summary_text.delta" => Some(ResponsesEventType::ReasoningSummaryTextDelta),
        "response.web_search_call.in_progress" => Some(ResponsesEventType::WebSearchCallInProgress),
        "response.web_search_call.searching" => Some(ResponsesEventType::WebSearchCallSearching),
        "response.web_search_call.completed" => Some(ResponsesEventType::WebSearchCallCompleted),
        "response.completed" => Some(ResponsesEventType::Completed),
        "error" => Some(ResponsesEventType::Error),
        _ => None,
    }
}

fn list_query(limit: Option<u32>, after: Option<&str>) -> String {
    let mut params = Vec::new();
    if let Some(limit) = limit {
        params.push(format!("limit={limit}"));
    }
    if let Some(after) = after {
        params.push(format!("after={after}"));
    }
    if params.is_empty() { String::new() } else { format!("?{}", params.join("&")) }
}

fn parse_batch(value: &serde_json::Value) -> UnifiedBatch {
    UnifiedBatch {
        id: value["id"].as_str().unwrap_or_default().to_string(),
        status: value["status"].as_str().unwrap_or_default().to_string(),
        endpoint: value["endpoint"].as_str().unwrap_or_default().to_string(),
        created_at: value["created_at"].as_u64().unwrap_or(0),
        output_file_id: value["output_file_id"].as_str().map(str::to_string),
        error_file_id: value["error_file_id"].as_str().map(str::to_string),
        request_counts: value.get("request_counts").map(|counts| UnifiedBatchRequestCounts {
            total: counts["total"].as_u64().unwrap_or(0),
            completed: counts["completed"].as_u64().unwrap_or(0),
            failed: counts["failed"].as_u64().unwrap_or(0),
        }),
        metadata: value["metadata"]
            .as_object()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect(),
    }
}

fn parse_file(value: &serde_json::Value) -> UnifiedFile {
    UnifiedFile {
        id: value["id"].as_str().unwrap_or_default().to_string(),
        filename: value["filename"].as_str().unwrap_or_default().to_string(),
        bytes: value["bytes"].as_u64().unwrap_or(0),
        purpose: value["purpose"].as_str().unwrap_or_default().to_string(),
        created_at: value["created_at"].as_u64().unwrap_or(0),
    }
}

fn parse_container(value: &serde_json::Value) -> UnifiedContainer {
    UnifiedContainer {
        id: value["id"].as_str().unwrap_or_default().to_string(),
        name: value["name"].as_str().unwrap_or_default().to_string(),
        created_at: value["created_at"].as_u64().unwrap_or(0),
        file_ids: value["file_ids"].as_array().cloned().unwrap_or_default().iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
    }
}

fn parse_container_file(value: &serde_json::Value, container_id: &str) -> UnifiedContainerFile {
    UnifiedContainerFile {
        id: value["id"].as_str().unwrap_or_default().to_string(),
        container_id: container_id.to_string(),
        filename: value["filename"].as_str().or_else(|| value["path"].as_str()).unwrap_or_default().to_string(),
        bytes: value["bytes"].as_u64().unwrap_or(0),
        created_at: value["created_at"].as_u64().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_omits_absent_optional_fields() {
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
            stream: false,
            tools: None,
            tool_choice: None,
            parallel_tool_calls: None,
            metadata: None,
            use_mcp_tools: false,
        };
        let body = openai_chat_request("gpt-4o", &input, false);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn finish_reason_maps_max_tokens_alias() {
        assert_eq!(finish_reason_from_str("max_tokens"), Some(UnifiedFinishReason::Length));
    }

    #[test]
    fn parses_response_with_tool_calls() {
        let value = serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "created": 1,
            "choices": [{
                "index": 0,
                "message": {
                    "content": null,
                    "tool_calls": [{"id": "call_1", "function": {"name": "get_weather", "arguments": "{}"}}],
                },
                "finish_reason": "tool_calls",
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
        });
        let response = parse_openai_response(value, "gpt-4o", 100).unwrap();
        assert_eq!(response.choices[0].finish_reason, Some(UnifiedFinishReason::ToolCalls));
        assert_eq!(response.choices[0].message.tool_calls.as_ref().unwrap()[0].function.name, "get_weather");
    }

    #[test]
    fn responses_request_carries_reasoning_summary_flag() {
        let input = ResponsesInput {
            messages: vec![UnifiedMessage::text(UnifiedRole::User, "hi")],
            instructions: None,
            max_output_tokens: None,
            temperature: None,
            tools: None,
            tool_choice: None,
            stream: false,
            reasoning_summary: true,
            use_mcp_tools: false,
        };
        let body = openai_responses_request("gpt-4o", &input, false);
        assert_eq!(body["reasoning"]["summary"], "auto");
        assert_eq!(body["input"][0]["role"], "user");
    }

    #[test]
    fn parses_responses_body_with_function_call_output_item() {
        let value = serde_json::json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "created_at": 1,
            "output": [{"type": "function_call", "call_id": "call_1", "name": "get_weather", "arguments": "{}"}],
            "usage": {"input_tokens": 10, "output_tokens": 5, "total_tokens": 15},
        });
        let response = parse_openai_responses_body(value, "gpt-4o", 50).unwrap();
        assert_eq!(response.choices[0].finish_reason, Some(UnifiedFinishReason::ToolCalls));
        assert_eq!(response.choices[0].message.tool_calls.as_ref().unwrap()[0].function.name, "get_weather");
    }

    #[test]
    fn parses_responses_body_concatenates_message_text_parts() {
        let value = serde_json::json!({
            "id": "resp_2",
            "model": "gpt-4o",
            "created_at": 1,
            "output": [{"type": "message", "content": [{"text": "hello "}, {"text": "world"}]}],
            "usage": {"input_tokens": 1, "output_tokens": 2, "total_tokens": 3},
        });
        let response = parse_openai_responses_body(value, "gpt-4o", 10).unwrap();
        assert_eq!(response.choices[0].message.content.as_text(), "hello world");
        assert_eq!(response.choices[0].finish_reason, Some(UnifiedFinishReason::Stop));
    }

    #[test]
    fn responses_event_type_from_wire_maps_known_events_and_drops_unknown() {
        assert_eq!(responses_event_type_from_wire("response.output_text.delta"), Some(ResponsesEventType::OutputTextDelta));
        assert_eq!(responses_event_type_from_wire("response.some_future_event"), None);
    }

    #[test]
    fn list_query_builds_querystring_only_when_params_present() {
        assert_eq!(list_query(None, None), "");
        assert_eq!(list_query(Some(10), None), "?limit=10");
        assert_eq!(list_query(Some(10), Some("cursor_1")), "?limit=10&after=cursor_1");
    }

    #[test]
    fn parse_batch_reads_request_counts_and_metadata() {
        let value = serde_json::json!({
            "id": "batch_1",
            "status": "completed",
            "endpoint": "/v1/chat/completions",
            "created_at": 1,
            "output_file_id": "file_out",
            "request_counts": {"total": 3, "completed": 3, "failed": 0},
            "metadata": {"project": "nexus"},
        });
        let batch = parse_batch(&value);
        assert_eq!(batch.output_file_id.as_deref(), Some("file_out"));
        assert_eq!(batch.request_counts.unwrap().total, 3);
        assert_eq!(batch.metadata.get("project").map(String::as_str), Some("nexus"));
    }

    #[test]
    fn parse_container_file_falls_back_to_path_field() {
        let value = serde_json::json!({"id": "cfile_1", "path": "/data/report.csv", "bytes": 128, "created_at": 1});
        let file = parse_container_file(&value, "container_1");
        assert_eq!(file.filename, "/data/report.csv");
        assert_eq!(file.container_id, "container_1");
    }
}
