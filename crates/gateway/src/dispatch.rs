//! Request dispatcher and fallback chain executor: resolves one
//! `UnifiedRequest` against the configured providers, retrying within a
//! provider per its `NetworkConfig` before moving to the next
//! `{provider, model}` pair in the chain.
//!
//! The one hard rule governing fallback: once a streaming attempt has
//! produced a [`ProviderOutcome::Stream`] to the caller, the dispatcher is
//! done — it never inspects or retries on errors surfacing later from
//! inside that stream. Those are forwarded to the caller as-is, same as
//! any other chunk. This falls out of the control flow below rather than
//! needing an explicit flag: `attempt` returns as soon as the transport
//! call resolves, which for a streaming transport is right after the
//! response headers (and, for SSE, the first bytes) arrive, not after the
//! stream drains.

use std::sync::Arc;
use std::time::{Duration, Instant};

use config::{LlmConfig, LlmProviderConfig, RequestKind};
use context::RequestContext;
use futures::StreamExt;
use indexmap::IndexMap;
use mcp::executor::ToolExecutor;
use rate_limit::{TokenRateLimitManager, TokenRateLimitRequest};
use schema::message::UnifiedMessage;
use schema::request::{ChatInput, CountTokensInput, FallbackTarget, UnifiedRequest, UnifiedRequestPayload};
use schema::response::{UnifiedResponse, UnifiedUsage};
use schema::tool::UnifiedTool;
use schema::{ErrorCategory, ErrorField, McpToolDescriptor, UnifiedResponseBody};
use secrecy::SecretString;

use crate::account::{self, SelectedAccount};
use crate::pool::WorkerPool;
use crate::provider::{ProviderOutcome, ProviderTransport, boxed_response};
use crate::token;

type AttemptResult = Result<ProviderOutcome, ErrorField>;

/// Everything `Dispatcher` needs to merge MCP tool descriptors into a
/// request and drive an agent-mode tool-calling loop. Absent entirely when
/// no MCP servers or in-process tools are configured, so a deployment with
/// MCP disabled pays no cost beyond one `Option` check per dispatch.
#[derive(Clone)]
pub struct McpContext {
    pub manager: Arc<mcp::Manager>,
    pub executor: ToolExecutor,
    pub agent_iteration_budget: u32,
}

struct ProviderHandle {
    config: LlmProviderConfig,
    transport: Arc<dyn ProviderTransport>,
    pool: WorkerPool<AttemptResult>,
}

/// Owns every configured provider's transport and worker pool, and routes
/// unified requests across them. Cheap to clone: cloning shares the same
/// providers and pools (`Arc`/`WorkerPool` are themselves cheap to clone).
#[derive(Clone)]
pub struct Dispatcher {
    providers: Arc<IndexMap<String, ProviderHandle>>,
    rate_limits: Arc<TokenRateLimitManager>,
    mcp: Option<McpContext>,
}

impl Dispatcher {
    /// Builds a dispatcher from the LLM subsystem configuration. Bedrock
    /// providers are supplied pre-built (their transport needs an
    /// async-constructed AWS SDK client) via `bedrock_transports`, keyed by
    /// provider name exactly as `bedrock_transports` is populated by the
    /// caller (see `gateway::router`).
    pub fn new(config: &LlmConfig, bedrock_transports: IndexMap<String, Arc<dyn ProviderTransport>>) -> Self {
        let mut providers = IndexMap::new();

        for (name, provider_config) in &config.providers {
            let transport: Arc<dyn ProviderTransport> = match provider_config {
                LlmProviderConfig::Bedrock(_) => match bedrock_transports.get(name) {
                    Some(transport) => transport.clone(),
                    None => continue,
                },
                _ => Arc::from(crate::transport::build(provider_config, crate::http::build(provider_config.network()))),
            };

            let pool = WorkerPool::with_name(provider_config.concurrency(), name.clone());
            providers.insert(
                name.clone(),
                ProviderHandle {
                    config: provider_config.clone(),
                    transport,
                    pool,
                },
            );
        }

        Self {
            providers: Arc::new(providers),
            rate_limits: Arc::new(TokenRateLimitManager::new()),
            mcp: None,
        }
    }

    /// Attaches MCP tool injection and agent-mode support. A dispatcher
    /// built without this call still serves every other operation;
    /// `use_mcp_tools` is silently a no-op and [`Self::dispatch_agent`]
    /// fails closed with `unsupported_operation`.
    pub fn with_mcp(mut self, mcp: McpContext) -> Self {
        self.mcp = Some(mcp);
        self
    }

    /// Dispatches one unified request, trying the primary `{provider,
    /// model}` and then each entry of `request.fallbacks` in order,
    /// stopping at the first attempt that succeeds or whose error is
    /// marked non-retryable.
    pub async fn dispatch(&self, mut request: UnifiedRequest, ctx: &RequestContext) -> AttemptResult {
        if let UnifiedRequestPayload::CountTokens(input) = &request.payload {
            return count_tokens(&request.model, input);
        }

        if let Some(mcp) = &self.mcp {
            self.inject_mcp_tools(mcp, &mut request.payload, ctx).await;
        }

        let kind = request_kind(&request.payload);
        let mut targets = Vec::with_capacity(1 + request.fallbacks.len());
        targets.push(FallbackTarget {
            provider: request.provider.clone(),
            model: request.model.clone(),
        });
        targets.extend(request.fallbacks.iter().cloned());

        // Once the request's own fallback list is exhausted, fall through
        // to the primary provider's statically configured fallback chain
        // (`LlmProviderConfig::fallback()`) so a deployment-level default
        // applies even to requests that never declared their own
        // fallbacks. Targets already present (by provider+model) are
        // skipped rather than retried twice.
        if let Some(primary) = self.providers.get(&request.provider) {
            for target in primary.config.fallback() {
                if !targets.iter().any(|existing| existing.provider == target.provider && existing.model == target.model) {
                    targets.push(target.clone());
                }
            }
        }

        let started_at = Instant::now();
        let mut last_error: Option<ErrorField> = None;
        let mut fallbacks_consumed: u64 = 0;
        let mut retries_consumed: u64 = 0;

        let outcome = 'dispatch: {
            for target in &targets {
                if ctx.is_expired() {
                    last_error = Some(ErrorField::new(ErrorCategory::Timeout, "request deadline expired before an attempt could be made"));
                    break;
                }

                let Some(handle) = self.providers.get(&target.provider) else {
                    last_error = Some(ErrorField::new(ErrorCategory::InvalidRequest, format!("unknown provider '{}'", target.provider)));
                    fallbacks_consumed += 1;
                    continue;
                };

                if !handle.config.supports(kind) {
                    last_error = Some(ErrorField::unsupported_operation(format!("provider '{}' does not allow {kind:?} requests", target.provider)));
                    fallbacks_consumed += 1;
                    continue;
                }

                let mut attempt_retries = 0;
                match self.attempt(&target.provider, handle, &target.model, &request.payload, ctx, &mut attempt_retries).await {
                    Ok(outcome) => {
                        retries_consumed += attempt_retries;
                        break 'dispatch Ok((target.provider.clone(), outcome));
                    }
                    Err(error) => {
                        retries_consumed += attempt_retries;
                        let retryable = error.retryable;
                        last_error = Some(error);
                        if !retryable {
                            break;
                        }
                        fallbacks_consumed += 1;
                    }
                }
            }

            Err(last_error.unwrap_or_else(|| ErrorField::new(ErrorCategory::BifrostInternal, "no provider was attempted")))
        };

        let operation = format!("{kind:?}");
        let mut attributes = vec![
            opentelemetry::KeyValue::new(telemetry::attributes::OPERATION, operation),
            opentelemetry::KeyValue::new(telemetry::attributes::MODEL_REQUESTED, request.model.clone()),
        ];

        let result = match outcome {
            Ok((provider, outcome)) => {
                attributes.push(opentelemetry::KeyValue::new(telemetry::attributes::PROVIDER, provider.clone()));
                attributes.push(opentelemetry::KeyValue::new(telemetry::attributes::USED_FALLBACK, provider != request.provider));
                Ok(stamp_provider(outcome, provider))
            }
            Err(error) => {
                attributes.push(opentelemetry::KeyValue::new(telemetry::attributes::PROVIDER, request.provider.clone()));
                attributes.push(opentelemetry::KeyValue::new(telemetry::attributes::ERROR_CATEGORY, format!("{:?}", error.category)));
                Err(error)
            }
        };

        telemetry::metrics::record_duration_ms(telemetry::metrics::names::GEN_AI_CLIENT_OPERATION_DURATION, started_at.elapsed().as_secs_f64() * 1000.0, &attributes);
        telemetry::metrics::add(telemetry::metrics::names::BIFROST_DISPATCH_RETRIES, retries_consumed, &attributes);
        telemetry::metrics::add(telemetry::metrics::names::BIFROST_DISPATCH_FALLBACKS, fallbacks_consumed, &attributes);

        result
    }

    /// Lists the models visible to `provider`, without any fallback: model
    /// listing is informational and a caller asking a specific provider
    /// for its models wants that provider's answer, not a substitute.
    pub async fn list_models(&self, provider: &str, ctx: &RequestContext) -> Result<schema::UnifiedModelsResponse, ErrorField> {
        let handle = self
            .providers
            .get(provider)
            .ok_or_else(|| ErrorField::new(ErrorCategory::InvalidRequest, format!("unknown provider '{provider}'")))?;

        let account = self.select_account(handle, RequestKind::ListModels, ctx)?;
        let base_url = handle.config.network().base_url.as_deref();
        handle.transport.list_models(&account, base_url, ctx).await
    }

    /// Runs one provider attempt, retrying in-place per the provider's
    /// `NetworkConfig` before surfacing the final error to the fallback
    /// loop in [`Self::dispatch`].
    async fn attempt(&self, provider_name: &str, handle: &ProviderHandle, model: &str, payload: &UnifiedRequestPayload, ctx: &RequestContext, retries_used: &mut u64) -> AttemptResult {
        let kind = request_kind(payload);

        if payload.is_streaming() && !handle.transport.supports_streaming() {
            return Err(ErrorField::unsupported_operation(format!("{:?} transport does not support streaming", handle.transport.provider_type())));
        }

        self.check_rate_limit(provider_name, handle, model, payload, ctx).await?;

        let network = handle.config.network();
        let mut backoff = network.retry_backoff_initial;

        let mut attempt_number = 0;
        loop {
            let account = self.select_account(handle, kind, ctx)?;
            let base_url = network.base_url.clone();
            let transport = handle.transport.clone();
            let model = model.to_string();
            let payload = payload.clone();
            let ctx_owned = ctx.clone();

            let result = handle
                .pool
                .submit(async move { transport.invoke(&model, &account, base_url.as_deref(), &payload, &ctx_owned).await })
                .await;

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(crate::pool::PoolError::BufferFull) => Err(ErrorField::new(ErrorCategory::ProviderUnavailable, "provider worker pool buffer is full").with_retryable(true)),
                Err(crate::pool::PoolError::ShuttingDown) => Err(ErrorField::new(ErrorCategory::ProviderUnavailable, "provider worker pool is shutting down")),
            };

            match outcome {
                Ok(outcome) => return Ok(outcome),
                Err(error) if error.retryable && error.category.backoff_retryable() && attempt_number < network.max_retries => {
                    attempt_number += 1;
                    *retries_used += 1;
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(network.retry_backoff_max);
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Selects a credential for this provider. Bedrock (and any provider
    /// configured with no accounts at all, e.g. a custom endpoint that
    /// needs no auth) gets an empty placeholder rather than failing
    /// selection, since `account::select` models "at least one account
    /// configured" as the normal case. A caller-supplied BYOK override, if
    /// present, always wins.
    fn select_account(&self, handle: &ProviderHandle, kind: RequestKind, ctx: &RequestContext) -> Result<SelectedAccount, ErrorField> {
        if let Some(override_key) = &ctx.api_key_override {
            return Ok(SelectedAccount { api_key: override_key.clone() });
        }

        let accounts = handle.config.accounts();
        if accounts.is_empty() {
            return Ok(SelectedAccount { api_key: SecretString::from(String::new()) });
        }

        account::select(accounts, kind)
    }

    async fn check_rate_limit(&self, provider_name: &str, handle: &ProviderHandle, model: &str, payload: &UnifiedRequestPayload, ctx: &RequestContext) -> Result<(), ErrorField> {
        let Some(client_identity) = &ctx.client_identity else {
            return Ok(());
        };

        let input_tokens = match payload {
            UnifiedRequestPayload::Chat(input) => token::count_messages(&cl100k(), &input.messages) as u32,
            UnifiedRequestPayload::Text(input) => token::count_text(&cl100k(), &input.prompt) as u32,
            _ => return Ok(()),
        };

        let model_limits = handle.config.models().get(model).and_then(|m| m.rate_limits);
        let request = TokenRateLimitRequest {
            client_id: client_identity.client_id.clone(),
            group: client_identity.group.clone(),
            provider: provider_name.to_string(),
            model: Some(model.to_string()),
            input_tokens,
        };

        match self.rate_limits.check_request(&request, handle.config.rate_limits().copied(), model_limits).await {
            Ok(None) => Ok(()),
            Ok(Some(wait)) if wait < Duration::MAX => Err(ErrorField::new(ErrorCategory::RateLimited, format!("token rate limit exceeded, retry after {wait:?}"))),
            Ok(Some(_)) => Err(ErrorField::new(ErrorCategory::RateLimited, "request exceeds the maximum burst capacity for this scope").with_retryable(false)),
            Err(error) => Err(ErrorField::new(ErrorCategory::BifrostInternal, error.to_string())),
        }
    }

    /// Merges the MCP manager's currently visible tool descriptors into
    /// `payload.tools`, for `Chat`/`Responses` payloads that opted in via
    /// `use_mcp_tools`. A no-op for every other payload variant and when
    /// the manager currently has nothing to offer.
    async fn inject_mcp_tools(&self, mcp: &McpContext, payload: &mut UnifiedRequestPayload, ctx: &RequestContext) {
        let wants_tools = match payload {
            UnifiedRequestPayload::Chat(input) => input.use_mcp_tools,
            UnifiedRequestPayload::Responses(input) => input.use_mcp_tools,
            _ => false,
        };
        if !wants_tools {
            return;
        }

        let tools: Vec<UnifiedTool> = mcp.manager.tools_for_context(ctx).await.into_iter().map(McpToolDescriptor::into_unified_tool).collect();
        if tools.is_empty() {
            return;
        }

        match payload {
            UnifiedRequestPayload::Chat(input) => merge_tools(&mut input.tools, tools),
            UnifiedRequestPayload::Responses(input) => merge_tools(&mut input.tools, tools),
            _ => {}
        }
    }

    /// Runs the agent-mode tool-calling loop: dispatches `request`
    /// as a chat completion, executes any tool calls the model returns
    /// through the MCP executor, feeds the results back, and repeats until
    /// the model stops asking for tools or the configured iteration budget
    /// is exhausted. Fails closed if this dispatcher was never given an
    /// [`McpContext`] via [`Self::with_mcp`].
    pub async fn dispatch_agent(&self, request: UnifiedRequest, ctx: &RequestContext, messages: Vec<UnifiedMessage>) -> Result<Vec<UnifiedMessage>, ErrorField> {
        let mcp = self
            .mcp
            .clone()
            .ok_or_else(|| ErrorField::unsupported_operation("agent mode requires an MCP context to be configured"))?;

        let base_input = match &request.payload {
            UnifiedRequestPayload::Chat(input) => input.clone(),
            _ => return Err(ErrorField::new(ErrorCategory::InvalidRequest, "agent mode requires a chat payload")),
        };

        let step = AgentModelStep {
            dispatcher: self.clone(),
            request,
            base_input,
            ctx: ctx.clone(),
        };

        mcp::agent::run(ctx, &step, &mcp.executor, messages, mcp.agent_iteration_budget).await
    }

    /// Lists every tool currently visible to `ctx` through the configured
    /// MCP manager, namespaced and ready to hand to a model. Fails closed
    /// when no [`McpContext`] was attached.
    pub async fn list_mcp_tools(&self, ctx: &RequestContext) -> Result<Vec<McpToolDescriptor>, ErrorField> {
        let mcp = self.mcp.as_ref().ok_or_else(|| ErrorField::unsupported_operation("MCP is not configured"))?;
        Ok(mcp.manager.tools_for_context(ctx).await)
    }

    /// Invokes a single MCP tool directly, bypassing the agent loop. Used
    /// by callers that already know which tool they want and just need
    /// its result, rather than a full model-driven conversation.
    pub async fn call_mcp_tool(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value, ErrorField> {
        let mcp = self.mcp.as_ref().ok_or_else(|| ErrorField::unsupported_operation("MCP is not configured"))?;
        mcp.manager.call_tool(name, arguments).await
    }
}

/// Drives one model round trip per agent iteration by dispatching a fresh
/// `Chat` request carrying the growing message transcript. Streaming is
/// disabled on every round regardless of what the original request asked
/// for, since the agent loop needs a complete message back to inspect for
/// tool calls.
struct AgentModelStep {
    dispatcher: Dispatcher,
    request: UnifiedRequest,
    base_input: ChatInput,
    ctx: RequestContext,
}

#[async_trait::async_trait]
impl mcp::agent::ModelStep for AgentModelStep {
    async fn call(&self, messages: &[UnifiedMessage]) -> Result<UnifiedMessage, ErrorField> {
        let mut input = self.base_input.clone();
        input.messages = messages.to_vec();
        input.stream = false;

        let mut request = self.request.clone();
        request.payload = UnifiedRequestPayload::Chat(input);

        match self.dispatcher.dispatch(request, &self.ctx).await? {
            ProviderOutcome::Response(response) => match *response {
                UnifiedResponseBody::Chat(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message)
                    .ok_or_else(|| ErrorField::new(ErrorCategory::BifrostInternal, "provider returned no choices")),
                _ => Err(ErrorField::new(ErrorCategory::BifrostInternal, "agent mode expected a chat response")),
            },
            ProviderOutcome::Stream(_) => Err(ErrorField::unsupported_operation("agent mode does not support a streaming model step")),
        }
    }
}

fn merge_tools(existing: &mut Option<Vec<UnifiedTool>>, mcp_tools: Vec<UnifiedTool>) {
    match existing {
        Some(tools) => tools.extend(mcp_tools),
        None => *existing = Some(mcp_tools),
    }
}

/// Overwrites the provider echoed in a successful outcome with the
/// dispatcher's resolved `target.provider`, not whatever wire-family
/// string the transport itself stamped. A transport only knows its own
/// wire format (`"openai"`, `"anthropic"`, ...); the caller needs the
/// configured provider *key* this attempt actually ran against, which may
/// be a fallback.
fn stamp_provider(outcome: ProviderOutcome, provider: String) -> ProviderOutcome {
    match outcome {
        ProviderOutcome::Response(mut response) => {
            response.set_provider(&provider);
            ProviderOutcome::Response(response)
        }
        ProviderOutcome::Stream(stream) => ProviderOutcome::Stream(Box::pin(stream.map(move |item| {
            item.map(|mut chunk| {
                chunk.provider = provider.clone();
                chunk
            })
        }))),
    }
}

// `cl100k_base` construction is cheap relative to a network round trip but
// not free; a real deployment would cache this behind a `OnceLock` keyed
// off the dispatcher. Left as a direct call here since every call site
// that needs it is already on the slow path of an upstream request.
fn cl100k() -> tiktoken_rs::CoreBPE {
    tiktoken_rs::cl100k_base().expect("cl100k_base is a static, always-valid encoding table")
}

fn count_tokens(model: &str, input: &CountTokensInput) -> AttemptResult {
    let count = token::count_tokens(input)?;
    Ok(boxed_response(UnifiedResponse {
        id: uuid::Uuid::new_v4().to_string(),
        model: model.to_string(),
        choices: Vec::new(),
        usage: UnifiedUsage {
            prompt_tokens: count as u32,
            completion_tokens: 0,
            total_tokens: count as u32,
            audio_tokens: None,
            reasoning_tokens: None,
        },
        created: 0,
        stop_reason: None,
        stop_sequence: None,
        provider: "bifrost".to_string(),
        model_requested: model.to_string(),
        latency_ms: 0,
        extra_fields: Default::default(),
    }))
}

fn request_kind(payload: &UnifiedRequestPayload) -> RequestKind {
    match payload {
        UnifiedRequestPayload::Chat(_) => RequestKind::Chat,
        UnifiedRequestPayload::Text(_) => RequestKind::Text,
        UnifiedRequestPayload::Responses(_) => RequestKind::Responses,
        UnifiedRequestPayload::Embedding(_) => RequestKind::Embedding,
        UnifiedRequestPayload::Speech(_) | UnifiedRequestPayload::SpeechStream(_) => RequestKind::Speech,
        UnifiedRequestPayload::Transcription(_) | UnifiedRequestPayload::TranscriptionStream(_) => RequestKind::Transcription,
        UnifiedRequestPayload::ImageGeneration(_) | UnifiedRequestPayload::ImageGenerationStream(_) => RequestKind::ImageGeneration,
        UnifiedRequestPayload::CountTokens(_) => RequestKind::CountTokens,
        UnifiedRequestPayload::ListModels => RequestKind::ListModels,
        UnifiedRequestPayload::BatchCreate(_)
        | UnifiedRequestPayload::BatchList(_)
        | UnifiedRequestPayload::BatchRetrieve(_)
        | UnifiedRequestPayload::BatchCancel(_)
        | UnifiedRequestPayload::BatchResults(_) => RequestKind::Batch,
        UnifiedRequestPayload::FileUpload(_)
        | UnifiedRequestPayload::FileList(_)
        | UnifiedRequestPayload::FileRetrieve(_)
        | UnifiedRequestPayload::FileDelete(_)
        | UnifiedRequestPayload::FileContent(_) => RequestKind::File,
        UnifiedRequestPayload::ContainerCreate(_)
        | UnifiedRequestPayload::ContainerList(_)
        | UnifiedRequestPayload::ContainerRetrieve(_)
        | UnifiedRequestPayload::ContainerDelete(_)
        | UnifiedRequestPayload::ContainerFileCreate(_)
        | UnifiedRequestPayload::ContainerFileList(_)
        | UnifiedRequestPayload::ContainerFileRetrieve(_)
        | UnifiedRequestPayload::ContainerFileContent(_)
        | UnifiedRequestPayload::ContainerFileDelete(_) => RequestKind::Container,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_payload_maps_to_chat_kind() {
        let payload = UnifiedRequestPayload::Chat(schema::request::ChatInput {
            messages: vec![schema::message::UnifiedMessage::text(schema::message::UnifiedRole::User, "hi")],
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
        });
        assert_eq!(request_kind(&payload), RequestKind::Chat);
    }

    #[test]
    fn list_models_payload_maps_to_list_models_kind() {
        let payload = UnifiedRequestPayload::ListModels;
        assert_eq!(request_kind(&payload), RequestKind::ListModels);
    }

    fn empty_dispatcher() -> Dispatcher {
        Dispatcher {
            providers: Arc::new(IndexMap::new()),
            rate_limits: Arc::new(TokenRateLimitManager::new()),
            mcp: None,
        }
    }

    #[tokio::test]
    async fn dispatch_agent_fails_closed_without_mcp_context() {
        let dispatcher = empty_dispatcher();
        let ctx = RequestContext::default();
        let request = UnifiedRequest {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            fallbacks: Vec::new(),
            extra_params: None,
            payload: UnifiedRequestPayload::Chat(schema::request::ChatInput {
                messages: vec![UnifiedMessage::text(schema::message::UnifiedRole::User, "hi")],
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
            }),
        };

        let error = dispatcher.dispatch_agent(request, &ctx, Vec::new()).await.unwrap_err();
        assert_eq!(error.category, ErrorCategory::UnsupportedOperation);
    }

    #[tokio::test]
    async fn list_mcp_tools_fails_closed_without_mcp_context() {
        let dispatcher = empty_dispatcher();
        let ctx = RequestContext::default();
        let error = dispatcher.list_mcp_tools(&ctx).await.unwrap_err();
        assert_eq!(error.category, ErrorCategory::UnsupportedOperation);
    }

    #[tokio::test]
    async fn inject_mcp_tools_merges_into_chat_payload_when_requested() {
        let manager = Arc::new(mcp::Manager::empty());
        manager
            .register_in_process_tool(
                "ping",
                "pings the host",
                schemars::schema_for!(serde_json::Value),
                Arc::new(|_args: serde_json::Value| Box::pin(async move { Ok(serde_json::json!({"pong": true})) })),
            )
            .await;

        let executor = ToolExecutor::new((*manager).clone(), Vec::new());
        let mcp_ctx = McpContext {
            manager,
            executor,
            agent_iteration_budget: 4,
        };

        let dispatcher = Dispatcher {
            providers: Arc::new(IndexMap::new()),
            rate_limits: Arc::new(TokenRateLimitManager::new()),
            mcp: Some(mcp_ctx),
        };

        let ctx = RequestContext::default();
        let mut payload = UnifiedRequestPayload::Chat(schema::request::ChatInput {
            messages: vec![UnifiedMessage::text(schema::message::UnifiedRole::User, "hi")],
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
            use_mcp_tools: true,
        });

        dispatcher.inject_mcp_tools(dispatcher.mcp.as_ref().unwrap(), &mut payload, &ctx).await;

        let UnifiedRequestPayload::Chat(input) = payload else {
            panic!("payload changed variant");
        };
        let tools = input.tools.expect("tools should be populated");
        assert_eq!(tools.len(), 1);
        assert!(tools[0].function.name.ends_with("__ping"));
    }
}
