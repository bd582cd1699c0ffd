//! Runtime context carried through a single Bifrost request.
//!
//! Every public dispatcher entry point takes a [`RequestContext`] alongside
//! the typed request. It threads a [`Deadline`], optional caller identity,
//! inbound headers (for header-rewrite rules and BYOK overrides), and the
//! distributed tracing span context.

mod client_identity;
mod deadline;

use std::time::Duration;

pub use client_identity::ClientIdentity;
pub use deadline::Deadline;
use fastrace::{Span, collector::SpanContext};
use http::HeaderMap;
use secrecy::SecretString;

/// Header name for caller-supplied provider API keys (Bring Your Own Key).
pub const PROVIDER_API_KEY_HEADER: &str = "X-Bifrost-Provider-Key";

/// Per-request context threaded through the dispatcher, worker pool, and
/// provider transports.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Deadline for the whole fallback chain, not just a single attempt.
    pub deadline: Deadline,
    /// Caller identity, when known, used for token rate limiting.
    pub client_identity: Option<ClientIdentity>,
    /// Caller-supplied API key overriding the configured one (BYOK).
    pub api_key_override: Option<SecretString>,
    /// Original inbound headers, consulted by header-forwarding rules.
    pub headers: HeaderMap,
    /// Parent span context for distributed tracing propagation.
    pub span_context: Option<SpanContext>,
}

impl RequestContext {
    /// Builds a context from inbound headers, extracting the BYOK override
    /// if present.
    pub fn from_headers(headers: HeaderMap, client_identity: Option<ClientIdentity>) -> Self {
        let api_key_override = headers
            .get(PROVIDER_API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|key| SecretString::from(key.to_string()));

        Self {
            deadline: Deadline::None,
            client_identity,
            api_key_override,
            headers,
            span_context: None,
        }
    }

    /// Attaches a deadline, returning the updated context.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Creates a tracing span rooted at the propagated parent, if any.
    pub fn new_span(&self, name: &'static str) -> Span {
        match self.span_context {
            Some(parent) => Span::root(name, parent),
            None => Span::root(name, SpanContext::random()),
        }
    }

    /// Whether the deadline for this request has already passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_expired()
    }

    /// Time remaining before the deadline, if any was set.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.deadline.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byok_header_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(PROVIDER_API_KEY_HEADER, "sk-test-123".parse().unwrap());

        let ctx = RequestContext::from_headers(headers, None);
        assert!(ctx.api_key_override.is_some());
    }

    #[test]
    fn deadline_sooner_of_prefers_caller_override() {
        let caller = Deadline::after(Duration::from_millis(10));
        let provider_default = Deadline::after(Duration::from_secs(60));

        let resolved = caller.sooner_of(provider_default);
        assert!(resolved.remaining().unwrap() <= Duration::from_millis(10));
    }

    #[test]
    fn no_deadline_never_expires() {
        assert!(!Deadline::None.is_expired());
        assert_eq!(Deadline::None.remaining(), None);
    }
}
