//! MCP (Model Context Protocol) downstream server configuration.

use std::{collections::BTreeMap, time::Duration};

use duration_str::deserialize_duration;
use header_rules::HeaderRule;
use serde::Deserialize;
use url::Url;

/// Restricts which tools of a downstream server are exposed to callers.
/// An empty `allow` means no allow-list is in effect (every tool passes
/// that phase); a non-empty `allow` admits only the named tools. `deny`
/// is applied afterwards regardless, so a name in both lists is denied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolFilterConfig {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// Protocol used to speak to an HTTP-based MCP server.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HttpProtocol {
    Sse,
    #[default]
    StreamingHttp,
    /// Try streaming-http first, fall back to SSE if the server rejects it.
    Auto,
}

/// Transport used to reach a downstream MCP server.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum McpTransport {
    /// A subprocess speaking JSON-RPC 2.0 over its stdin/stdout pipes.
    Stdio {
        cmd: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    /// An HTTP or SSE endpoint.
    Http {
        uri: Url,
        #[serde(default)]
        protocol: HttpProtocol,
        #[serde(default)]
        headers: Vec<HeaderRule>,
    },
}

/// Configuration for one downstream MCP server.
///
/// `deny_unknown_fields` is deliberately absent: it's incompatible with
/// `#[serde(flatten)]`, which `transport` relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct McpServerConfig {
    #[serde(flatten)]
    pub transport: McpTransport,
    #[serde(default)]
    pub tool_filter: ToolFilterConfig,
    /// When set, tool output is evaluated as code rather than appended
    /// verbatim to the conversation.
    #[serde(default)]
    pub is_code_mode: bool,
    /// Restricts automatic (agent-mode) execution to this subset of tools;
    /// `None` means all tools the filter exposes are eligible.
    #[serde(default)]
    pub tools_to_execute: Option<Vec<String>>,
}

/// Bounds the dynamic downstream client cache (clients created on demand
/// for per-request credentials rather than configured statically).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct McpDownstreamCacheConfig {
    pub max_size: u64,
    #[serde(deserialize_with = "deserialize_duration")]
    pub idle_timeout: Duration,
}

impl Default for McpDownstreamCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Configuration for MCP (Model Context Protocol) settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct McpConfig {
    pub enabled: bool,
    pub path: String,
    pub downstream_cache: McpDownstreamCacheConfig,
    pub servers: BTreeMap<String, McpServerConfig>,
    /// Maximum model-call/tool-execution round trips in agent mode before
    /// the loop is aborted even if the model keeps requesting tools.
    pub agent_iteration_budget: u32,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/mcp".to_string(),
            downstream_cache: McpDownstreamCacheConfig::default(),
            servers: BTreeMap::new(),
            agent_iteration_budget: 8,
        }
    }
}

impl McpConfig {
    pub fn has_servers(&self) -> bool {
        !self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use insta::assert_debug_snapshot;

    #[test]
    fn defaults() {
        let config: McpConfig = toml::from_str("").unwrap();
        assert_debug_snapshot!(&config, @r#"
        McpConfig {
            enabled: true,
            path: "/mcp",
            downstream_cache: McpDownstreamCacheConfig {
                max_size: 1000,
                idle_timeout: 600s,
            },
            servers: {},
            agent_iteration_budget: 8,
        }
        "#);
    }

    #[test]
    fn stdio_server() {
        let toml = indoc! {r#"
            [servers.filesystem]
            cmd = ["mcp-server-filesystem", "/data"]
        "#};
        let config: McpConfig = toml::from_str(toml).unwrap();
        assert!(matches!(
            config.servers["filesystem"].transport,
            McpTransport::Stdio { .. }
        ));
    }

    #[test]
    fn http_server_with_tool_filter() {
        let toml = indoc! {r#"
            [servers.search]
            uri = "https://search.example.com/mcp"
            protocol = "sse"
            tool_filter.allow = ["web_search"]
        "#};
        let config: McpConfig = toml::from_str(toml).unwrap();
        let server = &config.servers["search"];
        assert_eq!(server.tool_filter.allow, vec!["web_search".to_string()]);
        assert!(matches!(server.transport, McpTransport::Http { .. }));
    }
}
