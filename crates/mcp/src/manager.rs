//! Registry of connected MCP clients and their advertised tools.
//!
//! Connection setup (the handshake with a downstream server) always
//! happens before the client map's write lock is taken, so two clients
//! can initialize concurrently without blocking each other; the lock
//! only ever guards the map mutation itself.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use config::{McpConfig, McpServerConfig};
use context::RequestContext;
use schema::{ErrorField, McpToolDescriptor};
use tokio::sync::RwLock;

use crate::access;
use crate::downstream::DownstreamClient;
use crate::registry;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no MCP client registered with id '{0}'")]
    ClientNotFound(String),
    #[error("failed to connect to downstream MCP server '{0}': {1}")]
    Connect(String, anyhow::Error),
    #[error("downstream call failed: {0}")]
    Downstream(#[from] anyhow::Error),
}

type InProcessFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value, ErrorField>> + Send>>;
type InProcessHandler = Arc<dyn Fn(serde_json::Value) -> InProcessFuture + Send + Sync>;

struct RemoteEntry {
    client: DownstreamClient,
    tools: Vec<McpToolDescriptor>,
}

struct InProcessEntry {
    descriptor: McpToolDescriptor,
    handler: InProcessHandler,
}

/// Sentinel client ID namespacing tools registered directly by the host
/// process rather than discovered from a downstream server.
pub const IN_PROCESS_CLIENT_ID: &str = "local";

/// The set of registered MCP clients, safe for any number of concurrent
/// callers. Cheap to clone: cloning shares the same underlying state.
#[derive(Clone)]
pub struct Manager {
    remotes: Arc<RwLock<BTreeMap<String, RemoteEntry>>>,
    in_process: Arc<RwLock<BTreeMap<String, InProcessEntry>>>,
}

impl Manager {
    /// An empty manager with no clients registered, for tests and
    /// programmatic in-process-only setups.
    pub fn empty() -> Self {
        Self {
            remotes: Arc::new(RwLock::new(BTreeMap::new())),
            in_process: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Connects to every downstream server in `config` at startup. A
    /// single misconfigured server is logged and skipped rather than
    /// failing the whole gateway boot; the manager is usable afterwards
    /// with whichever servers connected.
    pub async fn new(config: McpConfig) -> anyhow::Result<Self> {
        let manager = Self::empty();

        for (id, server_config) in &config.servers {
            if let Err(error) = manager.register(id, server_config).await {
                log::error!(error:err = error; "failed to connect to MCP server '{id}' during startup");
            }
        }

        Ok(manager)
    }

    /// Disconnects every registered client, draining in-flight tool calls
    /// within each client's own shutdown grace period.
    pub async fn shutdown(&self) {
        let entries = {
            let mut remotes = self.remotes.write().await;
            std::mem::take(&mut *remotes)
        };

        for (id, entry) in entries {
            if let Err(error) = entry.client.shutdown().await {
                log::warn!(error:err = error; "error shutting down MCP client '{id}'");
            }
        }
    }

    /// Connects to a downstream server and populates its tool map.
    /// Overwrites any existing client registered under the same id.
    pub async fn register(&self, id: &str, config: &McpServerConfig) -> Result<(), Error> {
        let client = DownstreamClient::new(id, config).await.map_err(|error| Error::Connect(id.to_string(), error))?;

        let tools = client.list_tools().await?;
        let descriptors = tools
            .iter()
            .filter_map(|tool| registry::describe(id, tool).ok())
            .filter(|descriptor| access::is_tool_allowed(&config.tool_filter, &descriptor.name))
            .collect();

        let previous = {
            let mut remotes = self.remotes.write().await;
            remotes.insert(id.to_string(), RemoteEntry { client, tools: descriptors })
        };

        if let Some(previous) = previous {
            let _ = previous.client.shutdown().await;
        }

        Ok(())
    }

    /// Re-registers a client under the same id with new configuration.
    pub async fn edit(&self, id: &str, config: &McpServerConfig) -> Result<(), Error> {
        self.register(id, config).await
    }

    /// Disconnects and discards a client. In-flight tool calls that had
    /// already taken a snapshot of this client's tools complete or fail on
    /// their own; new look-ups see `tool_removed` immediately after this
    /// returns.
    pub async fn remove(&self, id: &str) -> Result<(), Error> {
        let entry = {
            let mut remotes = self.remotes.write().await;
            remotes.remove(id)
        };

        match entry {
            Some(entry) => {
                entry.client.shutdown().await?;
                Ok(())
            }
            None => Err(Error::ClientNotFound(id.to_string())),
        }
    }

    pub async fn list(&self) -> Vec<String> {
        self.remotes.read().await.keys().cloned().collect()
    }

    /// Registers a tool backed by a closure in this process rather than a
    /// downstream server. `schema` describes its parameters; `handler`
    /// receives the call's arguments and returns its result or a
    /// normalized error.
    pub async fn register_in_process_tool(
        &self,
        name: &str,
        description: &str,
        input_schema: schemars::Schema,
        handler: InProcessHandler,
    ) {
        let descriptor = McpToolDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            client_id: IN_PROCESS_CLIENT_ID.to_string(),
        };

        self.in_process.write().await.insert(name.to_string(), InProcessEntry { descriptor, handler });
    }

    pub async fn remove_in_process_tool(&self, name: &str) {
        self.in_process.write().await.remove(name);
    }

    /// Tool descriptors visible to the current request, in stable order
    /// by (client id, tool name). `ctx` is accepted for contract fidelity
    /// with per-caller filtering (e.g. future client-group ACLs); the
    /// allow/deny filtering that already happened at `register` time
    /// doesn't depend on it.
    pub async fn tools_for_context(&self, _ctx: &RequestContext) -> Vec<McpToolDescriptor> {
        let remotes = self.remotes.read().await;
        let in_process = self.in_process.read().await;

        let mut tools: Vec<McpToolDescriptor> = remotes.values().flat_map(|entry| entry.tools.iter().cloned()).collect();
        tools.extend(in_process.values().map(|entry| entry.descriptor.clone()));
        tools.sort_by(|a, b| (a.client_id.as_str(), a.name.as_str()).cmp(&(b.client_id.as_str(), b.name.as_str())));
        tools
    }

    /// Invokes a tool by its namespaced name (`"{client_id}__{tool}"`, or
    /// a bare name for an in-process tool). The tool's owning client is
    /// looked up fresh at call time (a snapshot), never under the
    /// manager's write lock, so `execute` never blocks `register`/`remove`.
    pub async fn call_tool(&self, namespaced_name: &str, arguments: serde_json::Value) -> Result<serde_json::Value, ErrorField> {
        if let Some((client_id, tool_name)) = schema::mcp::split_namespaced_tool_name(namespaced_name)
            && client_id != IN_PROCESS_CLIENT_ID
        {
            return self.call_remote_tool(client_id, tool_name, arguments).await;
        }

        self.call_in_process_tool(namespaced_name, arguments).await
    }

    async fn call_remote_tool(&self, client_id: &str, tool_name: &str, arguments: serde_json::Value) -> Result<serde_json::Value, ErrorField> {
        let client = {
            let remotes = self.remotes.read().await;
            remotes.get(client_id).map(|entry| entry.client.clone())
        };

        let Some(client) = client else {
            return Err(ErrorField::tool_removed());
        };

        let params = rmcp::model::CallToolRequestParam {
            name: tool_name.to_string().into(),
            arguments: arguments.as_object().cloned(),
        };

        let result = client
            .call_tool(params)
            .await
            .map_err(|error| ErrorField::new(schema::ErrorCategory::ToolExecution, error.to_string()))?;

        serde_json::to_value(result.content).map_err(|error| ErrorField::new(schema::ErrorCategory::ToolExecution, error.to_string()))
    }

    async fn call_in_process_tool(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value, ErrorField> {
        let handler = {
            let in_process = self.in_process.read().await;
            in_process.get(name).map(|entry| entry.handler.clone())
        };

        match handler {
            Some(handler) => handler(arguments).await,
            None => Err(ErrorField::tool_removed()),
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_client_remove_errors() {
        let manager = Manager::empty();
        let result = manager.remove("missing").await;
        assert!(matches!(result, Err(Error::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn in_process_tool_round_trips() {
        let manager = Manager::empty();
        let schema = schemars::Schema::try_from(serde_json::json!({"type": "object"})).unwrap();

        manager
            .register_in_process_tool(
                "echo",
                "echoes its input",
                schema,
                Arc::new(|args| Box::pin(async move { Ok(args) })),
            )
            .await;

        let tools = manager.tools_for_context(&RequestContext::default()).await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].client_id, IN_PROCESS_CLIENT_ID);

        let result = manager.call_tool("echo", serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn removed_in_process_tool_call_fails_non_retryable() {
        let manager = Manager::empty();
        let schema = schemars::Schema::try_from(serde_json::json!({"type": "object"})).unwrap();

        manager
            .register_in_process_tool("noop", "does nothing", schema, Arc::new(|_| Box::pin(async { Ok(serde_json::Value::Null) })))
            .await;
        manager.remove_in_process_tool("noop").await;

        let error = manager.call_tool("noop", serde_json::Value::Null).await.unwrap_err();
        assert!(!error.retryable);
        assert_eq!(error.code.as_deref(), Some("tool_removed"));
    }
}
