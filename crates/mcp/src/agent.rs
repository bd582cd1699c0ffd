//! Agent mode: dispatch a model call, execute any tool calls it returns,
//! feed the results back, and repeat until the model stops asking for
//! tools or the iteration budget runs out.
//!
//! This module only knows about tool execution; it has no opinion on how
//! a "model call" is made. The gateway crate supplies that as a closure
//! so `mcp` doesn't need to depend on the dispatcher.

use context::RequestContext;
use schema::{ErrorField, UnifiedContentContainer, UnifiedMessage, UnifiedRole, UnifiedToolCall};

use crate::executor::{ToolCall, ToolExecutor};

/// One round trip to the model: given the conversation so far, returns
/// the assistant's reply, which may itself request further tool calls.
#[async_trait::async_trait]
pub trait ModelStep: Send + Sync {
    async fn call(&self, messages: &[UnifiedMessage]) -> Result<UnifiedMessage, ErrorField>;
}

/// Runs the agent loop to completion. Returns the full message transcript,
/// including every tool call and its result, ending on an assistant
/// message with no outstanding tool calls or, if the iteration budget is
/// exhausted first, on the last message produced.
pub async fn run(
    ctx: &RequestContext,
    model: &dyn ModelStep,
    executor: &ToolExecutor,
    mut messages: Vec<UnifiedMessage>,
    iteration_budget: u32,
) -> Result<Vec<UnifiedMessage>, ErrorField> {
    for _ in 0..iteration_budget {
        if ctx.is_expired() {
            return Ok(messages);
        }

        let reply = model.call(&messages).await?;
        let tool_calls = reply.compute_tool_calls();
        messages.push(reply);

        let Some(tool_calls) = tool_calls.filter(|calls| !calls.is_empty()) else {
            return Ok(messages);
        };

        for tool_call in tool_calls {
            let result = execute_one(ctx, executor, &tool_call).await;
            messages.push(tool_result_message(&tool_call, result));
        }
    }

    Ok(messages)
}

async fn execute_one(ctx: &RequestContext, executor: &ToolExecutor, tool_call: &UnifiedToolCall) -> Result<serde_json::Value, ErrorField> {
    let arguments = tool_call
        .function
        .arguments
        .as_value()
        .map_err(|error| ErrorField::new(schema::ErrorCategory::ToolExecution, error.to_string()))?;

    executor
        .execute(
            ctx,
            ToolCall {
                name: tool_call.function.name.clone(),
                arguments,
            },
        )
        .await
}

fn tool_result_message(tool_call: &UnifiedToolCall, result: Result<serde_json::Value, ErrorField>) -> UnifiedMessage {
    let content = match result {
        Ok(value) => value.to_string(),
        Err(error) => serde_json::json!({"error": error.to_string()}).to_string(),
    };

    UnifiedMessage {
        role: UnifiedRole::Tool,
        content: UnifiedContentContainer::Text(content),
        tool_calls: None,
        tool_call_id: Some(tool_call.id.clone()),
    }
}
