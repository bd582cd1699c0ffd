//! End-to-end coverage of the request dispatcher against a local mock
//! upstream, without touching any real provider.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use context::RequestContext;
use gateway::Dispatcher;
use indexmap::IndexMap;
use schema::message::{UnifiedContentContainer, UnifiedMessage, UnifiedRole};
use schema::request::{ChatInput, UnifiedRequest, UnifiedRequestPayload};
use serde_json::json;
use tokio::net::TcpListener;

fn chat_request(messages: Vec<UnifiedMessage>) -> ChatInput {
    ChatInput {
        messages,
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
    }
}

/// Spawns a minimal OpenAI-compatible chat completions endpoint that always
/// succeeds, returning its base URL.
async fn spawn_ok_server() -> String {
    let app = axum::Router::new().route(
        "/chat/completions",
        post(|| async {
            Json(json!({
                "id": "chatcmpl-test",
                "model": "gpt-4",
                "created": 0,
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "hello from the mock"},
                    "finish_reason": "stop",
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8},
            }))
        }),
    );
    spawn(app).await
}

/// Spawns a server whose first N requests fail with a retryable 503 and
/// whose following requests succeed, to exercise fallback/retry.
async fn spawn_flaky_server(fail_times: usize) -> String {
    let remaining = Arc::new(AtomicUsize::new(fail_times));
    let app = axum::Router::new().route(
        "/chat/completions",
        post(move |State(remaining): State<Arc<AtomicUsize>>| async move {
            if remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None }).is_ok() {
                return (axum::http::StatusCode::SERVICE_UNAVAILABLE, "upstream overloaded").into_response();
            }
            Json(json!({
                "id": "chatcmpl-test",
                "model": "gpt-4",
                "created": 0,
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "recovered"},
                    "finish_reason": "stop",
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8},
            }))
            .into_response()
        }),
    );
    let app = app.with_state(remaining);
    spawn(app).await
}

/// Spawns a server that always responds 404 (mapped to `model_not_found`),
/// counting the number of requests it receives so a test can assert the
/// dispatcher didn't spend its in-place retry budget on a category that
/// should fall back immediately instead.
async fn spawn_model_not_found_server() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = axum::Router::new().route(
        "/chat/completions",
        post(move |State(hits): State<Arc<AtomicUsize>>| async move {
            hits.fetch_add(1, Ordering::SeqCst);
            (axum::http::StatusCode::NOT_FOUND, "model not found").into_response()
        }),
    );
    let app = app.with_state(hits.clone());
    (spawn(app).await, hits)
}

async fn spawn(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn openai_provider_config(base_url: &str) -> config::LlmProviderConfig {
    let toml = format!(
        r#"
        type = "openai"
        network.base_url = "{base_url}"

        [[accounts]]
        api_key = "sk-test"
        "#
    );
    toml::from_str(&toml).unwrap()
}

fn llm_config(providers: Vec<(&str, config::LlmProviderConfig)>) -> config::LlmConfig {
    let mut config = config::LlmConfig::default();
    for (name, provider) in providers {
        config.providers.insert(name.to_string(), provider);
    }
    config
}

#[tokio::test]
async fn dispatches_chat_to_configured_provider() {
    let base_url = spawn_ok_server().await;
    let config = llm_config(vec![("primary", openai_provider_config(&base_url))]);
    let dispatcher = Dispatcher::new(&config, IndexMap::new());

    let request = UnifiedRequest {
        provider: "primary".to_string(),
        model: "gpt-4".to_string(),
        fallbacks: Vec::new(),
        extra_params: None,
        payload: UnifiedRequestPayload::Chat(chat_request(vec![UnifiedMessage::text(UnifiedRole::User, "hi")])),
    };

    let outcome = dispatcher.dispatch(request, &RequestContext::default()).await.unwrap();
    let gateway::ProviderOutcome::Response(response) = outcome else {
        panic!("expected a non-streaming response");
    };
    let UnifiedContentContainer::Text(text) = &response.choices[0].message.content else {
        panic!("expected text content");
    };
    assert_eq!(text, "hello from the mock");
}

#[tokio::test]
async fn falls_back_to_next_provider_on_failure() {
    let failing_base_url = spawn_flaky_server(usize::MAX).await;
    let healthy_base_url = spawn_ok_server().await;

    let config = llm_config(vec![
        ("flaky", openai_provider_config(&failing_base_url)),
        ("healthy", openai_provider_config(&healthy_base_url)),
    ]);
    let dispatcher = Dispatcher::new(&config, IndexMap::new());

    let request = UnifiedRequest {
        provider: "flaky".to_string(),
        model: "gpt-4".to_string(),
        fallbacks: vec![schema::request::FallbackTarget {
            provider: "healthy".to_string(),
            model: "gpt-4".to_string(),
        }],
        extra_params: None,
        payload: UnifiedRequestPayload::Chat(chat_request(vec![UnifiedMessage::text(UnifiedRole::User, "hi")])),
    };

    let outcome = dispatcher.dispatch(request, &RequestContext::default()).await.unwrap();
    let gateway::ProviderOutcome::Response(response) = outcome else {
        panic!("expected a non-streaming response");
    };
    let UnifiedContentContainer::Text(text) = &response.choices[0].message.content else {
        panic!("expected text content");
    };
    assert_eq!(text, "hello from the mock");
    assert_eq!(response.provider, "healthy", "caller should observe the fallback provider's configured key, not the wire-family name the transport itself knows about");
}

#[tokio::test]
async fn retries_in_place_before_exhausting_provider() {
    let base_url = spawn_flaky_server(1).await;
    let config = llm_config(vec![("primary", openai_provider_config(&base_url))]);
    let dispatcher = Dispatcher::new(&config, IndexMap::new());

    let request = UnifiedRequest {
        provider: "primary".to_string(),
        model: "gpt-4".to_string(),
        fallbacks: Vec::new(),
        extra_params: None,
        payload: UnifiedRequestPayload::Chat(chat_request(vec![UnifiedMessage::text(UnifiedRole::User, "hi")])),
    };

    let outcome = dispatcher.dispatch(request, &RequestContext::default()).await.unwrap();
    let gateway::ProviderOutcome::Response(response) = outcome else {
        panic!("expected a non-streaming response");
    };
    let UnifiedContentContainer::Text(text) = &response.choices[0].message.content else {
        panic!("expected text content");
    };
    assert_eq!(text, "recovered");
}

#[tokio::test]
async fn model_not_found_falls_back_immediately_without_in_place_retry() {
    let (failing_base_url, hits) = spawn_model_not_found_server().await;
    let healthy_base_url = spawn_ok_server().await;

    let config = llm_config(vec![("flaky", openai_provider_config(&failing_base_url)), ("healthy", openai_provider_config(&healthy_base_url))]);
    let dispatcher = Dispatcher::new(&config, IndexMap::new());

    let request = UnifiedRequest {
        provider: "flaky".to_string(),
        model: "gpt-4".to_string(),
        fallbacks: vec![schema::request::FallbackTarget {
            provider: "healthy".to_string(),
            model: "gpt-4".to_string(),
        }],
        extra_params: None,
        payload: UnifiedRequestPayload::Chat(chat_request(vec![UnifiedMessage::text(UnifiedRole::User, "hi")])),
    };

    let outcome = dispatcher.dispatch(request, &RequestContext::default()).await.unwrap();
    let gateway::ProviderOutcome::Response(response) = outcome else {
        panic!("expected a non-streaming response");
    };
    assert_eq!(response.provider, "healthy");
    assert_eq!(hits.load(Ordering::SeqCst), 1, "model_not_found should fall back after exactly one attempt, not spend the in-place retry budget");
}

#[tokio::test]
async fn unknown_provider_is_invalid_request() {
    let config = llm_config(vec![]);
    let dispatcher = Dispatcher::new(&config, IndexMap::new());

    let request = UnifiedRequest {
        provider: "does-not-exist".to_string(),
        model: "gpt-4".to_string(),
        fallbacks: Vec::new(),
        extra_params: None,
        payload: UnifiedRequestPayload::Chat(chat_request(vec![UnifiedMessage::text(UnifiedRole::User, "hi")])),
    };

    let error = dispatcher.dispatch(request, &RequestContext::default()).await.unwrap_err();
    assert_eq!(error.category, schema::ErrorCategory::InvalidRequest);
}

#[tokio::test]
async fn count_tokens_never_reaches_a_provider() {
    let config = llm_config(vec![]);
    let dispatcher = Dispatcher::new(&config, IndexMap::new());

    let request = UnifiedRequest {
        provider: "anything".to_string(),
        model: "gpt-4".to_string(),
        fallbacks: Vec::new(),
        extra_params: None,
        payload: UnifiedRequestPayload::CountTokens(schema::request::CountTokensInput {
            messages: vec![UnifiedMessage::text(UnifiedRole::User, "count me please")],
            system: None,
            tools: None,
        }),
    };

    let outcome = dispatcher.dispatch(request, &RequestContext::default()).await.unwrap();
    let gateway::ProviderOutcome::Response(response) = outcome else {
        panic!("expected a non-streaming response");
    };
    assert!(response.usage.prompt_tokens > 0);
}
