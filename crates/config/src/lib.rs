//! Bifrost configuration structures, mapping the `bifrost.toml` file.

#![deny(missing_docs)]

mod client_identification;
mod error;
mod health;
mod llm;
mod loader;
mod mcp;
mod server;
mod telemetry;

use std::path::Path;

pub use client_identification::{ClientIdSource, ClientIdentificationConfig, ClientIdentificationValidation};
pub use error::Error;
pub use header_rules::{HeaderForward, HeaderInsert, HeaderRemove, HeaderRenameDuplicate, HeaderRule};
pub use health::HealthConfig;
pub use llm::{
    AccountConfig, BedrockProviderConfig, ConcurrencyConfig, CustomProviderConfig, FallbackTarget, LlmConfig,
    LlmProviderConfig, ModelConfig, ModelFilter, NetworkConfig, ProviderConfig, ProviderType, RequestKind,
};
pub use mcp::{
    HttpProtocol, McpConfig, McpDownstreamCacheConfig, McpServerConfig, McpTransport, ToolFilterConfig,
};
pub use rate_limit::TokenRateLimitsConfig;
use serde::Deserialize;
pub use server::ServerConfig;
pub use telemetry::TelemetryConfig;

/// Root configuration structure for the Bifrost gateway.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    pub server: ServerConfig,
    /// Model Context Protocol configuration settings.
    pub mcp: McpConfig,
    /// LLM provider configuration settings.
    pub llm: LlmConfig,
    /// Telemetry configuration settings.
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Loads and validates configuration from a TOML file, expanding
    /// `{{ env.VAR }}` placeholders against the process environment.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Re-validates an already-loaded configuration, e.g. after a hot
    /// reload has rebuilt it in memory rather than from disk.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.mcp.has_servers() && !self.llm.has_providers() {
            anyhow::bail!("no downstream servers configured: at least one MCP server or LLM provider is required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config, @r#"
        Config {
            server: ServerConfig {
                listen_address: None,
                health: HealthConfig {
                    enabled: true,
                    path: "/health",
                },
                client_identification: ClientIdentificationConfig {
                    enabled: false,
                    validation: ClientIdentificationValidation {
                        group_values: {},
                    },
                    client_id: None,
                    group_id: None,
                },
            },
            mcp: McpConfig {
                enabled: true,
                path: "/mcp",
                downstream_cache: McpDownstreamCacheConfig {
                    max_size: 1000,
                    idle_timeout: 600s,
                },
                servers: {},
                agent_iteration_budget: 8,
            },
            llm: LlmConfig {
                enabled: true,
                providers: {},
            },
            telemetry: TelemetryConfig {
                service_name: None,
                resource_attributes: {},
            },
        }
        "#);
    }
}
