//! The provider transport seam: one trait every upstream wire
//! format implements, so the dispatcher can drive OpenAI, Anthropic,
//! Bedrock and Google transports identically.
//!
//! A transport is handed the already-selected account/model and the full
//! unified payload, and returns either a complete response or a chunk
//! stream. Operations a given wire format doesn't support return
//! `unsupported_operation` rather than panicking, so a custom
//! OpenAI-compatible endpoint that only serves chat still composes with
//! the full dispatcher.

use async_trait::async_trait;
use config::ProviderType;
use context::RequestContext;
use schema::{ErrorField, UnifiedModelsResponse, UnifiedRequestPayload, UnifiedResponseBody};

use crate::account::SelectedAccount;
use crate::stream::ChunkStream;

/// What invoking a provider for one unified operation produces: either a
/// single response, or (for the payload's streaming variants) a chunk
/// stream the caller forwards to its own client unmodified.
pub enum ProviderOutcome {
    Response(Box<UnifiedResponseBody>),
    Stream(ChunkStream),
}

/// A single upstream wire format. Implementors are stateless aside from
/// their own HTTP client / SDK handle, constructed once at startup and
/// shared behind an `Arc` across every worker in that provider's pool.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// The wire family this transport speaks. Distinct from the
    /// provider's configured name: several providers (Azure, Cohere,
    /// Mistral, Groq, Ollama, a custom endpoint) share the OpenAI wire
    /// format but have different `provider_type()`.
    fn provider_type(&self) -> ProviderType;

    /// Whether this transport can produce a [`ProviderOutcome::Stream`]
    /// for the payload's streaming variants. Transports that answer
    /// `false` still have to implement the non-streaming path for every
    /// operation; the dispatcher rejects a streaming request to a
    /// non-streaming-capable transport with `unsupported_operation`
    /// before ever calling `invoke`.
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Executes one unified operation against `model`, authenticated as
    /// `account`. `base_url` is the provider's configured override, if
    /// any; `ctx` carries the caller's deadline and any BYOK override.
    ///
    /// Implementors that don't support a given `payload` variant should
    /// return [`ErrorField::unsupported_operation`] rather than a generic
    /// error, so the fallback executor can tell "this provider can't do
    /// this at all" apart from "this attempt failed and another provider
    /// might succeed".
    async fn invoke(
        &self,
        model: &str,
        account: &SelectedAccount,
        base_url: Option<&str>,
        payload: &UnifiedRequestPayload,
        ctx: &RequestContext,
    ) -> Result<ProviderOutcome, ErrorField>;

    /// Lists the models this account can see. Most transports hit a
    /// dedicated models endpoint; providers without one (Bedrock, some
    /// custom endpoints) fall back to whatever static model list their
    /// configuration carries, resolved one layer up in the dispatcher.
    async fn list_models(&self, account: &SelectedAccount, base_url: Option<&str>, ctx: &RequestContext) -> Result<UnifiedModelsResponse, ErrorField> {
        let _ = (account, base_url, ctx);
        Err(ErrorField::unsupported_operation(format!("{:?} does not support listing models", self.provider_type())))
    }
}

/// Shorthand used throughout the dispatcher/transports for a boxed
/// response, avoiding a large `Ok` variant on the stack of every `invoke`
/// call.
pub fn boxed_response(response: impl Into<UnifiedResponseBody>) -> ProviderOutcome {
    ProviderOutcome::Response(Box::new(response.into()))
}
