//! LLM provider configuration: network/concurrency envelopes, accounts
//! (weighted key selection), model overrides, and the fallback chain.

use std::{borrow::Cow, collections::BTreeMap, fmt, time::Duration};

use duration_str::deserialize_duration;
use header_rules::HeaderRule;
use indexmap::IndexMap;
use rate_limit::TokenRateLimitsConfig;
use regex::{Regex, RegexBuilder};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// Network-level transport settings for a provider's upstream calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Per-request timeout before the worker pool classifies the attempt as
    /// `timeout` and hands it to the retry/fallback machinery.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// In-provider retry attempts before falling back to the next
    /// `{provider, model}` pair in the chain.
    pub max_retries: u32,
    #[serde(deserialize_with = "deserialize_duration")]
    pub retry_backoff_initial: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub retry_backoff_max: Duration,
    /// Overrides the provider's default API base URL.
    pub base_url: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_backoff_initial: Duration::from_millis(200),
            retry_backoff_max: Duration::from_secs(5),
            base_url: None,
        }
    }
}

/// Bounds on a provider's worker pool.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConcurrencyConfig {
    /// Fixed number of concurrent upstream calls this provider's pool runs.
    pub concurrency: usize,
    /// Bounded FIFO buffer depth; `submit` beyond this either blocks or
    /// fails fast depending on the caller's deadline.
    pub buffer_size: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            buffer_size: 256,
        }
    }
}

/// A unified operation kind, used to scope what an account or a custom
/// provider is allowed to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    Chat,
    Text,
    Responses,
    Embedding,
    Speech,
    Transcription,
    ImageGeneration,
    CountTokens,
    ListModels,
    Batch,
    File,
    Container,
}

/// Provider type enumeration. Doubles as the "wire family" a custom
/// provider impersonates: anything OpenAI-compatible (Azure, Cohere,
/// Mistral, Groq, Ollama) is marshaled through the OpenAI transport with a
/// different base URL and header set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    Openai,
    Anthropic,
    Google,
    Bedrock,
    Vertex,
    Azure,
    Cohere,
    Mistral,
    Groq,
    Ollama,
}

impl ProviderType {
    /// Whether this provider type is marshaled through the OpenAI-compatible
    /// transport (chat completions wire format).
    pub fn is_openai_compatible(self) -> bool {
        matches!(
            self,
            Self::Openai | Self::Azure | Self::Cohere | Self::Mistral | Self::Groq | Self::Ollama
        )
    }
}

/// Declares an OpenAI-compatible (or Google-compatible, for Vertex) endpoint
/// that isn't one of the natively-implemented providers.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomProviderConfig {
    pub base_provider_type: ProviderType,
    /// Restricts this provider to a subset of unified operations; `None`
    /// means all operations the base wire format supports are allowed.
    #[serde(default)]
    pub allowed_requests: Option<Vec<RequestKind>>,
}

/// One credential slot under a provider, eligible for weighted-random
/// selection among accounts whose `allowed_requests` covers the requested
/// operation.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    pub api_key: SecretString,
    /// Relative selection weight; accounts with higher weight are picked
    /// proportionally more often. Zero disables the account without
    /// removing it from configuration.
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub allowed_requests: Option<Vec<RequestKind>>,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("api_key", &"<redacted>")
            .field("weight", &self.weight)
            .field("allowed_requests", &self.allowed_requests)
            .finish()
    }
}

fn default_weight() -> u32 {
    1
}

/// Per-model override: rename to the provider's own model id, narrower rate
/// limits, and extra headers sent only for that model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub rename: Option<String>,
    pub rate_limits: Option<TokenRateLimitsConfig>,
    pub headers: Vec<HeaderRule>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            rename: None,
            rate_limits: None,
            headers: Vec::new(),
        }
    }
}

/// One hop in a fallback chain: try this model on this provider next.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackTarget {
    pub provider: String,
    pub model: String,
}

/// Case-insensitive regex filter used to auto-route unqualified model names
/// to a provider.
#[derive(Clone)]
pub struct ModelFilter {
    regex: Regex,
}

impl ModelFilter {
    fn new(pattern: &str) -> Result<Self, String> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err("model_filter cannot be empty".to_string());
        }
        let regex = RegexBuilder::new(trimmed)
            .case_insensitive(true)
            .build()
            .map_err(|err| format!("invalid model_filter regex: {err}"))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, model: &str) -> bool {
        self.regex.is_match(model)
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for ModelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFilter").field("pattern", &self.pattern()).finish()
    }
}

impl<'de> Deserialize<'de> for ModelFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pattern = Cow::<'de, str>::deserialize(deserializer)?;
        ModelFilter::new(pattern.as_ref()).map_err(serde::de::Error::custom)
    }
}

/// One provider's full configuration: how to reach it, how hard to hammer
/// it, which credentials to round-robin through, and where to fall back to
/// on failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub network: NetworkConfig,
    pub concurrency: ConcurrencyConfig,
    pub custom: Option<CustomProviderConfig>,
    pub accounts: Vec<AccountConfig>,
    pub model_filter: Option<ModelFilter>,
    pub models: BTreeMap<String, ModelConfig>,
    pub rate_limits: Option<TokenRateLimitsConfig>,
    pub headers: Vec<HeaderRule>,
    pub fallback: Vec<FallbackTarget>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            custom: None,
            accounts: Vec::new(),
            model_filter: None,
            models: BTreeMap::new(),
            rate_limits: None,
            headers: Vec::new(),
            fallback: Vec::new(),
        }
    }
}

/// AWS Bedrock's configuration shape differs enough (SigV4 credentials
/// instead of a bearer API key, no per-model headers) to warrant its own
/// struct rather than bending [`ProviderConfig`] around it.
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BedrockProviderConfig {
    pub access_key_id: Option<SecretString>,
    pub secret_access_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
    pub profile: Option<String>,
    pub region: String,
    pub network: NetworkConfig,
    pub concurrency: ConcurrencyConfig,
    pub model_filter: Option<ModelFilter>,
    pub models: BTreeMap<String, ModelConfig>,
    pub fallback: Vec<FallbackTarget>,
}

impl Default for BedrockProviderConfig {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            profile: None,
            region: "us-east-1".to_string(),
            network: NetworkConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            model_filter: None,
            models: BTreeMap::new(),
            fallback: Vec::new(),
        }
    }
}

impl fmt::Debug for BedrockProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BedrockProviderConfig")
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<redacted>"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("profile", &self.profile)
            .field("region", &self.region)
            .field("network", &self.network)
            .field("concurrency", &self.concurrency)
            .field("model_filter", &self.model_filter)
            .field("models", &self.models)
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Complete LLM provider configuration, tagged by provider family.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum LlmProviderConfig {
    Openai(ProviderConfig),
    Anthropic(ProviderConfig),
    Google(ProviderConfig),
    Bedrock(BedrockProviderConfig),
    /// An OpenAI- or Google-wire-compatible endpoint not natively
    /// implemented (Azure, Cohere, Mistral, Groq, Ollama, Vertex).
    /// `custom.base_provider_type` selects which transport marshals it.
    Custom(ProviderConfig),
}

impl LlmProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::Openai(_) => ProviderType::Openai,
            Self::Anthropic(_) => ProviderType::Anthropic,
            Self::Google(_) => ProviderType::Google,
            Self::Bedrock(_) => ProviderType::Bedrock,
            Self::Custom(config) => config
                .custom
                .as_ref()
                .map(|c| c.base_provider_type)
                .unwrap_or(ProviderType::Openai),
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        match self {
            Self::Openai(c) | Self::Anthropic(c) | Self::Google(c) | Self::Custom(c) => &c.network,
            Self::Bedrock(c) => &c.network,
        }
    }

    pub fn concurrency(&self) -> ConcurrencyConfig {
        match self {
            Self::Openai(c) | Self::Anthropic(c) | Self::Google(c) | Self::Custom(c) => c.concurrency,
            Self::Bedrock(c) => c.concurrency,
        }
    }

    pub fn fallback(&self) -> &[FallbackTarget] {
        match self {
            Self::Openai(c) | Self::Anthropic(c) | Self::Google(c) | Self::Custom(c) => &c.fallback,
            Self::Bedrock(c) => &c.fallback,
        }
    }

    pub fn model_filter(&self) -> Option<&ModelFilter> {
        match self {
            Self::Openai(c) | Self::Anthropic(c) | Self::Google(c) | Self::Custom(c) => c.model_filter.as_ref(),
            Self::Bedrock(c) => c.model_filter.as_ref(),
        }
    }

    pub fn models(&self) -> &BTreeMap<String, ModelConfig> {
        match self {
            Self::Openai(c) | Self::Anthropic(c) | Self::Google(c) | Self::Custom(c) => &c.models,
            Self::Bedrock(c) => &c.models,
        }
    }

    pub fn rate_limits(&self) -> Option<&TokenRateLimitsConfig> {
        match self {
            Self::Openai(c) | Self::Anthropic(c) | Self::Google(c) | Self::Custom(c) => c.rate_limits.as_ref(),
            Self::Bedrock(_) => None,
        }
    }

    pub fn headers(&self) -> &[HeaderRule] {
        match self {
            Self::Openai(c) | Self::Anthropic(c) | Self::Google(c) | Self::Custom(c) => &c.headers,
            Self::Bedrock(_) => &[],
        }
    }

    pub fn accounts(&self) -> &[AccountConfig] {
        match self {
            Self::Openai(c) | Self::Anthropic(c) | Self::Google(c) | Self::Custom(c) => &c.accounts,
            Self::Bedrock(_) => &[],
        }
    }

    /// Whether this provider supports the given unified operation, per its
    /// `custom.allowed_requests` declaration (natively implemented
    /// providers support everything their transport implements).
    pub fn supports(&self, kind: RequestKind) -> bool {
        let allowed = match self {
            Self::Custom(c) => c.custom.as_ref().and_then(|custom| custom.allowed_requests.as_ref()),
            _ => None,
        };
        match allowed {
            Some(allowed) => allowed.contains(&kind),
            None => true,
        }
    }
}

/// The whole LLM subsystem configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    enabled: bool,
    pub providers: IndexMap<String, LlmProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: IndexMap::new(),
        }
    }
}

impl LlmConfig {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use insta::assert_debug_snapshot;

    #[test]
    fn llm_config_defaults() {
        let config: LlmConfig = toml::from_str("").unwrap();
        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            providers: {},
        }
        "#);
    }

    #[test]
    fn openai_provider_with_two_weighted_accounts() {
        let toml = indoc! {r#"
            type = "openai"

            [[accounts]]
            api_key = "sk-primary"
            weight = 3

            [[accounts]]
            api_key = "sk-secondary"
            weight = 1
        "#};

        let config: LlmProviderConfig = toml::from_str(toml).unwrap();
        let LlmProviderConfig::Openai(provider) = &config else {
            panic!("expected openai provider");
        };
        assert_eq!(provider.accounts.len(), 2);
        assert_eq!(provider.accounts[0].weight, 3);
        assert_eq!(provider.accounts[1].weight, 1);
    }

    #[test]
    fn custom_provider_requires_base_provider_type() {
        let toml = indoc! {r#"
            type = "custom"

            [custom]
            base_provider_type = "groq"
            allowed_requests = ["chat"]
        "#};

        let config: LlmProviderConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.provider_type(), ProviderType::Groq);
        assert!(config.supports(RequestKind::Chat));
        assert!(!config.supports(RequestKind::Embedding));
    }

    #[test]
    fn model_filter_rejects_empty_pattern() {
        let err = toml::from_str::<LlmProviderConfig>(indoc! {r#"
            type = "openai"
            model_filter = ""
        "#})
        .unwrap_err();
        assert!(err.to_string().contains("model_filter cannot be empty"));
    }
}
