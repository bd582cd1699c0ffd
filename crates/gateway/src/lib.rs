//! Bifrost's gateway: dispatches unified LLM requests across configured
//! providers, with per-provider worker pools, weighted key selection,
//! fallback chains, and a streaming event router shared by every wire
//! format.

mod account;
mod dispatch;
mod error;
mod http;
mod pool;
mod provider;
mod server;
mod stream;
mod token;
mod transport;

use std::sync::Arc;

use aws_config::Region;
use aws_credential_types::Credentials;
use config::{Config, LlmProviderConfig};
use indexmap::IndexMap;

pub use dispatch::{Dispatcher, McpContext};
pub use provider::{ProviderOutcome, ProviderTransport};

/// Builds the gateway's axum router from the full application
/// configuration. The dispatcher gets an [`McpContext`] built from
/// `mcp_manager` so tool injection (`use_mcp_tools`) and agent-mode
/// dispatch are available; a deployment with no MCP servers configured
/// still gets one, since the manager itself is cheap when empty.
pub async fn router(config: Config, mcp_manager: Arc<mcp::Manager>) -> anyhow::Result<axum::Router> {
    let bedrock_transports = build_bedrock_transports(&config.llm).await?;
    let executor = mcp::executor::ToolExecutor::new((*mcp_manager).clone(), Vec::new());
    let mcp_context = McpContext {
        manager: mcp_manager,
        executor,
        agent_iteration_budget: config.mcp.agent_iteration_budget,
    };

    let dispatcher = Dispatcher::new(&config.llm, bedrock_transports).with_mcp(mcp_context);
    Ok(server::router(dispatcher))
}

/// Bedrock transports need an async-constructed AWS SDK client (region
/// resolution, credential chain, optional endpoint override), so they're
/// built up front here rather than inside `transport::build`, which is
/// synchronous.
async fn build_bedrock_transports(llm_config: &config::LlmConfig) -> anyhow::Result<IndexMap<String, Arc<dyn ProviderTransport>>> {
    let mut transports = IndexMap::new();

    for (name, provider_config) in &llm_config.providers {
        let LlmProviderConfig::Bedrock(bedrock_config) = provider_config else {
            continue;
        };

        let region = Region::new(bedrock_config.region.clone());
        let mut loader = aws_config::from_env().region(region);

        if let (Some(access_key), Some(secret_key)) = (&bedrock_config.access_key_id, &bedrock_config.secret_access_key) {
            use secrecy::ExposeSecret;
            loader = loader.credentials_provider(Credentials::new(
                access_key.expose_secret(),
                secret_key.expose_secret(),
                bedrock_config.session_token.as_ref().map(|token| token.expose_secret().to_string()),
                None,
                "bifrost_bedrock_provider",
            ));
        }

        if let Some(profile) = &bedrock_config.profile {
            loader = loader.profile_name(profile);
        }

        let mut sdk_config = loader.load().await;
        if let Some(base_url) = &bedrock_config.network.base_url {
            sdk_config = sdk_config.into_builder().endpoint_url(base_url).build();
        }

        let client = aws_sdk_bedrockruntime::Client::new(&sdk_config);
        transports.insert(name.clone(), Arc::new(transport::bedrock::BedrockTransport::new(client)) as Arc<dyn ProviderTransport>);
    }

    Ok(transports)
}
