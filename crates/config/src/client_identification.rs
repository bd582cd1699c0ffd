//! Client identification for per-client/per-group token rate limiting.

use std::collections::HashSet;

use serde::Deserialize;

/// Where a client/group identifier is read from on an inbound request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientIdSource {
    /// Read from an HTTP header.
    HttpHeader(String),
    /// Read from a claim of the bearer JWT, by dotted path (e.g. `"sub"`, `"org.id"`).
    JwtClaim(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientIdentificationValidation {
    /// If non-empty, `group_id` values not in this set are rejected rather
    /// than silently falling back to "no group".
    pub group_values: HashSet<String>,
}

/// How callers are identified for the purpose of token rate limiting.
///
/// Disabled by default: provider rate limits still apply globally, keyed
/// by the literal string `"anonymous"`, when no client identification is
/// configured.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientIdentificationConfig {
    pub enabled: bool,
    pub validation: ClientIdentificationValidation,
    pub client_id: Option<ClientIdSource>,
    pub group_id: Option<ClientIdSource>,
}

impl Default for ClientIdentificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            validation: ClientIdentificationValidation::default(),
            client_id: None,
            group_id: None,
        }
    }
}
