//! Span/metric attribute key conventions, loosely following the
//! OpenTelemetry GenAI semantic conventions.

/// The provider identifier (e.g. "openai", "anthropic").
pub const PROVIDER: &str = "gen_ai.system";

/// The requested model identifier, before fallback resolution.
pub const MODEL_REQUESTED: &str = "gen_ai.request.model";

/// The operation name (chat, embedding, batch.create, ...).
pub const OPERATION: &str = "gen_ai.operation.name";

/// Whether the response came from a fallback provider rather than the
/// primary.
pub const USED_FALLBACK: &str = "bifrost.used_fallback";

/// The normalized error category, when a request failed.
pub const ERROR_CATEGORY: &str = "error.type";
