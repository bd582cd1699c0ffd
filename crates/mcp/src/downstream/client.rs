//! A single downstream MCP server connection, reachable over stdio, HTTP or
//! SSE, speaking uniformly through [`DownstreamClient::list_tools`] and
//! [`DownstreamClient::call_tool`] regardless of transport.

use std::sync::Arc;

use config::{HttpProtocol, McpServerConfig, McpTransport};
use http::HeaderMap;
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool};
use rmcp::service::RunningService;
use rmcp::transport::common::client_side_sse::FixedInterval;
use rmcp::transport::sse_client::{SseClient, SseClientConfig};
use rmcp::transport::streamable_http_client::{StreamableHttpClient, StreamableHttpClientTransportConfig};
use rmcp::transport::{SseClientTransport, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use tokio::process::Command;

struct Inner {
    name: String,
    service: RunningService<RoleClient, ()>,
}

/// A connected downstream MCP client. Cheap to clone: the underlying
/// connection is shared.
#[derive(Clone)]
pub struct DownstreamClient {
    inner: Arc<Inner>,
}

impl DownstreamClient {
    pub async fn new(name: &str, config: &McpServerConfig) -> anyhow::Result<Self> {
        log::debug!("creating a downstream server connection for {name}");

        let service = match &config.transport {
            McpTransport::Stdio { cmd, env } => spawn_stdio_client(cmd, env).await?,
            McpTransport::Http { uri, protocol, headers } => create_http_client(uri, *protocol, headers).await?,
        };

        Ok(Self {
            inner: Arc::new(Inner { name: name.to_string(), service }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub async fn list_tools(&self) -> anyhow::Result<Vec<Tool>> {
        let result = self.inner.service.list_tools(Default::default()).await?;
        Ok(result.tools)
    }

    pub async fn call_tool(&self, params: CallToolRequestParam) -> anyhow::Result<CallToolResult> {
        let result = self.inner.service.call_tool(params).await?;
        Ok(result)
    }

    /// Gracefully tears down the subprocess or connection. Called by the
    /// manager on `remove`. If another clone of this client is still in
    /// flight, the connection is left for that handle to clean up.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        if let Ok(inner) = Arc::try_unwrap(self.inner) {
            inner.service.cancel().await?;
        }
        Ok(())
    }
}

/// Spawns `cmd` as a child process and speaks JSON-RPC 2.0 over its
/// stdin/stdout pipes. The manager owns the resulting service's lifetime:
/// dropping (or explicitly cancelling) it kills the subprocess, satisfying
/// the contract that the manager controls subprocess spawn/kill.
async fn spawn_stdio_client(cmd: &[String], env: &std::collections::BTreeMap<String, String>) -> anyhow::Result<RunningService<RoleClient, ()>> {
    let Some((program, args)) = cmd.split_first() else {
        anyhow::bail!("stdio MCP server has an empty command");
    };

    let mut command = Command::new(program);
    command.args(args).envs(env);

    let transport = TokioChildProcess::new(command)?;
    let service = ().serve(transport).await?;

    Ok(service)
}

async fn create_http_client(uri: &url::Url, protocol: HttpProtocol, header_rules: &[header_rules::HeaderRule]) -> anyhow::Result<RunningService<RoleClient, ()>> {
    let mut headers = HeaderMap::new();
    header_rules::apply(header_rules, &HeaderMap::new(), &mut headers);

    let client = reqwest::Client::builder().default_headers(headers).build()?;

    match protocol {
        HttpProtocol::StreamingHttp => streamable_http_service(client, uri).await,
        HttpProtocol::Sse => sse_service(client, uri).await,
        HttpProtocol::Auto => match streamable_http_service(client.clone(), uri).await {
            Ok(service) => Ok(service),
            Err(error) => {
                log::warn!("streamable-http handshake with {uri} failed ({error}), falling back to SSE");
                sse_service(client, uri).await
            }
        },
    }
}

async fn streamable_http_service<C>(client: C, uri: &url::Url) -> anyhow::Result<RunningService<RoleClient, ()>>
where
    C: StreamableHttpClient + Send + Sync + 'static,
{
    let transport_config = StreamableHttpClientTransportConfig::with_uri(uri.to_string());
    let transport = StreamableHttpClientTransport::with_client(client, transport_config);

    Ok(().serve(transport).await?)
}

async fn sse_service<C>(client: C, uri: &url::Url) -> anyhow::Result<RunningService<RoleClient, ()>>
where
    C: SseClient + Send + Sync + 'static,
{
    let client_config = SseClientConfig {
        sse_endpoint: uri.to_string().into(),
        retry_policy: Arc::new(FixedInterval::default()),
        use_message_endpoint: None,
    };

    let transport = SseClientTransport::start_with_client(client, client_config).await?;
    Ok(().serve(transport).await?)
}
