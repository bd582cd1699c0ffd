//! Tool execution with a plugin chain in front of it.
//!
//! Plugins run in registration order on the way in (`pre_hook`) and
//! reverse order on the way out (`post_hook`), the usual middleware
//! onion: the first-registered plugin sees the call first and the result
//! last.

use std::sync::Arc;

use context::RequestContext;
use schema::{ErrorCategory, ErrorField};
use serde_json::Value;

use crate::manager::Manager;

/// One step of the plugin chain wrapping tool execution: governance
/// checks, logging, redaction, or anything else that needs to see every
/// call and result uniformly.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    /// Inspects (and may rewrite) a call before it reaches the tool.
    /// Returning `Err` aborts execution with that error instead of
    /// invoking the tool at all.
    async fn pre_hook(&self, call: ToolCall) -> Result<ToolCall, ErrorField> {
        Ok(call)
    }

    /// Inspects (and may rewrite) a tool's result before it's returned
    /// to the caller.
    async fn post_hook(&self, call: &ToolCall, result: Value) -> Result<Value, ErrorField> {
        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Executes tool calls against a [`Manager`] through an ordered plugin
/// chain. Safe to call concurrently with any number of other executions
/// and with the manager's `register`/`edit`/`remove`: the manager takes
/// its own snapshot of the tool's owning client at call time.
#[derive(Clone)]
pub struct ToolExecutor {
    manager: Manager,
    plugins: Arc<Vec<Arc<dyn Plugin>>>,
}

impl ToolExecutor {
    pub fn new(manager: Manager, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            manager,
            plugins: Arc::new(plugins),
        }
    }

    /// Runs `call` through the plugin chain and the manager. `ctx`'s
    /// deadline bounds the whole execution, not just the tool invocation:
    /// an already-expired deadline fails fast before any plugin runs.
    pub async fn execute(&self, ctx: &RequestContext, call: ToolCall) -> Result<Value, ErrorField> {
        if ctx.is_expired() {
            return Err(ErrorField::new(ErrorCategory::Timeout, "deadline expired before tool execution started"));
        }

        let mut call = call;
        for plugin in self.plugins.iter() {
            call = plugin.pre_hook(call).await?;
        }

        let mut result = self.manager.call_tool(&call.name, call.arguments.clone()).await?;

        for plugin in self.plugins.iter().rev() {
            result = plugin.post_hook(&call, result).await?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::ErrorCategory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPlugin {
        pre_calls: Arc<AtomicUsize>,
        post_calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Plugin for CountingPlugin {
        async fn pre_hook(&self, call: ToolCall) -> Result<ToolCall, ErrorField> {
            self.pre_calls.fetch_add(1, Ordering::SeqCst);
            Ok(call)
        }

        async fn post_hook(&self, _call: &ToolCall, result: Value) -> Result<Value, ErrorField> {
            self.post_calls.fetch_add(1, Ordering::SeqCst);
            Ok(result)
        }
    }

    struct AbortingPlugin;

    #[async_trait::async_trait]
    impl Plugin for AbortingPlugin {
        async fn pre_hook(&self, _call: ToolCall) -> Result<ToolCall, ErrorField> {
            Err(ErrorField::new(ErrorCategory::PermissionDenied, "blocked by governance"))
        }
    }

    #[tokio::test]
    async fn plugin_chain_runs_pre_and_post() {
        let manager = Manager::empty();
        let schema = schemars::Schema::try_from(serde_json::json!({"type": "object"})).unwrap();
        manager
            .register_in_process_tool("echo", "echoes", schema, Arc::new(|args| Box::pin(async move { Ok(args) })))
            .await;

        let pre_calls = Arc::new(AtomicUsize::new(0));
        let post_calls = Arc::new(AtomicUsize::new(0));
        let plugin = Arc::new(CountingPlugin {
            pre_calls: pre_calls.clone(),
            post_calls: post_calls.clone(),
        });

        let executor = ToolExecutor::new(manager, vec![plugin]);
        let ctx = RequestContext::default();
        let result = executor
            .execute(
                &ctx,
                ToolCall {
                    name: "echo".to_string(),
                    arguments: serde_json::json!({"x": 1}),
                },
            )
            .await
            .unwrap();

        assert_eq!(result, serde_json::json!({"x": 1}));
        assert_eq!(pre_calls.load(Ordering::SeqCst), 1);
        assert_eq!(post_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn aborting_plugin_short_circuits_execution() {
        let manager = Manager::empty();
        let executor = ToolExecutor::new(manager, vec![Arc::new(AbortingPlugin)]);
        let ctx = RequestContext::default();

        let error = executor
            .execute(
                &ctx,
                ToolCall {
                    name: "whatever".to_string(),
                    arguments: Value::Null,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(error.category, ErrorCategory::PermissionDenied);
    }
}
