//! HTTP surface: one axum router exposing the unified operation set
//! directly as JSON, without per-vendor wire translation at the edge
//! (that translation already happened once, inside each provider
//! transport). Callers send a [`UnifiedRequest`] and get back a
//! [`UnifiedResponse`] or, for streaming operations, a server-sent-events
//! stream of [`schema::chunk::StreamChunk`].

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use context::RequestContext;
use futures::StreamExt;
use schema::message::UnifiedMessage;
use schema::request::UnifiedRequest;
use schema::{ErrorField, McpToolDescriptor};
use serde::{Deserialize, Serialize};

use crate::dispatch::Dispatcher;
use crate::provider::ProviderOutcome;

/// Builds the gateway's axum router, ready to be nested or served
/// directly by the host binary.
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/v1/dispatch", post(dispatch))
        .route("/v1/dispatch/agent", post(dispatch_agent))
        .route("/v1/models/{provider}", get(list_models))
        .route("/v1/mcp/tools", get(list_mcp_tools))
        .route("/v1/mcp/execute", post(execute_mcp_tool))
        .with_state(Arc::new(dispatcher))
}

async fn dispatch(State(dispatcher): State<Arc<Dispatcher>>, headers: HeaderMap, Json(request): Json<UnifiedRequest>) -> Result<Response, ApiError> {
    let ctx = RequestContext::from_headers(headers, None);
    let streaming = request.payload.is_streaming();

    match dispatcher.dispatch(request, &ctx).await.map_err(ApiError)? {
        ProviderOutcome::Response(response) => Ok(Json(response).into_response()),
        ProviderOutcome::Stream(stream) if streaming => {
            let events = stream.map(|result| {
                let event = match result {
                    Ok(chunk) => Event::default().json_data(&chunk).unwrap_or_else(|_| Event::default().data(r#"{"error":"serialization failed"}"#)),
                    Err(error) => Event::default().event("error").json_data(&error).unwrap_or_else(|_| Event::default().data(r#"{"error":"serialization failed"}"#)),
                };
                Ok::<_, Infallible>(event)
            });
            Ok(Sse::new(events).into_response())
        }
        // A transport may legitimately return a stream outcome for a
        // non-streaming request if it only knows how to produce
        // chunked output; buffer it down to a single response instead
        // of leaking internal transport shape to a caller who asked
        // for `stream: false`.
        ProviderOutcome::Stream(stream) => Ok(Json(collect_stream_as_response(stream).await?).into_response()),
    }
}

async fn collect_stream_as_response(mut stream: crate::stream::ChunkStream) -> Result<schema::chunk::StreamChunk, ApiError> {
    let mut last = None;
    while let Some(item) = stream.next().await {
        last = Some(item.map_err(ApiError)?);
    }
    last.ok_or_else(|| ApiError(ErrorField::new(schema::ErrorCategory::BifrostInternal, "stream produced no chunks")))
}

async fn list_models(State(dispatcher): State<Arc<Dispatcher>>, Path(provider): Path<String>, headers: HeaderMap) -> Result<Json<schema::UnifiedModelsResponse>, ApiError> {
    let ctx = RequestContext::from_headers(headers, None);
    let response = dispatcher.list_models(&provider, &ctx).await.map_err(ApiError)?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct AgentDispatchRequest {
    request: UnifiedRequest,
    messages: Vec<UnifiedMessage>,
}

/// Runs the agent-mode tool-calling loop to completion and returns the
/// full resulting transcript, rather than a single chunk or response.
/// Agent mode has no streaming variant: the loop needs a complete message
/// back from each round to decide whether to call another tool.
async fn dispatch_agent(State(dispatcher): State<Arc<Dispatcher>>, headers: HeaderMap, Json(body): Json<AgentDispatchRequest>) -> Result<Json<Vec<UnifiedMessage>>, ApiError> {
    let ctx = RequestContext::from_headers(headers, None);
    let messages = dispatcher.dispatch_agent(body.request, &ctx, body.messages).await.map_err(ApiError)?;
    Ok(Json(messages))
}

async fn list_mcp_tools(State(dispatcher): State<Arc<Dispatcher>>, headers: HeaderMap) -> Result<Json<Vec<McpToolDescriptor>>, ApiError> {
    let ctx = RequestContext::from_headers(headers, None);
    let started_at = std::time::Instant::now();
    let tools = dispatcher.list_mcp_tools(&ctx).await.map_err(ApiError)?;
    telemetry::metrics::record_duration_ms(telemetry::metrics::names::MCP_TOOLS_LIST_DURATION, started_at.elapsed().as_secs_f64() * 1000.0, &[]);
    Ok(Json(tools))
}

#[derive(Deserialize)]
struct ExecuteMcpToolRequest {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Serialize)]
struct ExecuteMcpToolResponse {
    result: serde_json::Value,
}

async fn execute_mcp_tool(State(dispatcher): State<Arc<Dispatcher>>, Json(body): Json<ExecuteMcpToolRequest>) -> Result<Json<ExecuteMcpToolResponse>, ApiError> {
    let started_at = std::time::Instant::now();
    let attributes = [opentelemetry::KeyValue::new("mcp.tool.name", body.name.clone())];
    let result = dispatcher.call_mcp_tool(&body.name, body.arguments).await.map_err(ApiError)?;
    telemetry::metrics::record_duration_ms(telemetry::metrics::names::MCP_TOOL_CALL_DURATION, started_at.elapsed().as_secs_f64() * 1000.0, &attributes);
    Ok(Json(ExecuteMcpToolResponse { result }))
}

/// Wraps [`ErrorField`] so it can be returned directly from an axum
/// handler, mapping each error category onto the HTTP status a client
/// expects, independent of whatever status the upstream provider itself
/// used.
struct ApiError(ErrorField);

impl ApiError {
    fn status_code(&self) -> StatusCode {
        use schema::ErrorCategory::*;
        match self.0.category {
            InvalidRequest => StatusCode::BAD_REQUEST,
            Authentication => StatusCode::UNAUTHORIZED,
            PermissionDenied => StatusCode::FORBIDDEN,
            ModelNotFound => StatusCode::NOT_FOUND,
            UnsupportedOperation => StatusCode::NOT_IMPLEMENTED,
            RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ContextLength => StatusCode::BAD_REQUEST,
            ContentPolicy => StatusCode::BAD_REQUEST,
            Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProviderUnavailable | Upstream5xx => StatusCode::BAD_GATEWAY,
            ToolExecution | StreamProtocol | BifrostInternal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.0)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::ErrorCategory;

    #[test]
    fn rate_limited_maps_to_429() {
        let error = ApiError(ErrorField::new(ErrorCategory::RateLimited, "slow down"));
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn unsupported_operation_maps_to_501() {
        let error = ApiError(ErrorField::unsupported_operation("nope"));
        assert_eq!(error.status_code(), StatusCode::NOT_IMPLEMENTED);
    }
}
