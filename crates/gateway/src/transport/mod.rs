//! Wire-format transports, one per [`config::ProviderType`] family.

pub mod anthropic;
pub mod bedrock;
pub mod google;
pub mod openai;

use config::{LlmProviderConfig, ProviderType};
use header_rules::HeaderRule;

use crate::provider::ProviderTransport;

/// Builds the transport for every provider family except Bedrock, which
/// needs an async-constructed AWS SDK client and is built separately by
/// the caller (see `gateway::build_bedrock_transport`).
pub fn build(provider_config: &LlmProviderConfig, client: reqwest::Client) -> Box<dyn ProviderTransport> {
    let headers: Vec<HeaderRule> = provider_config.headers().to_vec();
    let provider_type = provider_config.provider_type();

    match provider_type {
        ProviderType::Anthropic => Box::new(anthropic::AnthropicTransport::new(client, headers)),
        // Vertex's production auth is OAuth2 service-account bearer tokens, not
        // Google's public API-key query param; routing it through the same
        // transport as `Google` is a known simplification until a dedicated
        // Vertex credential path exists (see DESIGN.md).
        ProviderType::Google | ProviderType::Vertex => Box::new(google::GoogleTransport::new(client, headers)),
        _ if provider_type.is_openai_compatible() => Box::new(openai::OpenAiTransport::new(client, provider_type, headers)),
        other => unreachable!("{other:?} has no non-Bedrock transport builder; add one or route it through is_openai_compatible"),
    }
}
