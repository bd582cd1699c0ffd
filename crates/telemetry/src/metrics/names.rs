//! Standard metric names, following OpenTelemetry semantic conventions where
//! one exists. See <https://opentelemetry.io/docs/specs/semconv/gen-ai/>.

/// Duration of a full dispatch, from entry to final response/stream open,
/// including any fallback attempts. Histogram, milliseconds.
pub const GEN_AI_CLIENT_OPERATION_DURATION: &str = "gen_ai.client.operation.duration";

/// Cumulative token usage split by `token.type` (input/output) attribute.
pub const GEN_AI_CLIENT_TOKEN_USAGE: &str = "gen_ai.client.token.usage";

/// Time until the first stream chunk is forwarded to the caller.
pub const GEN_AI_CLIENT_TIME_TO_FIRST_CHUNK: &str = "gen_ai.client.time_to_first_chunk";

/// Number of in-provider retries consumed before success or fallback.
pub const BIFROST_DISPATCH_RETRIES: &str = "bifrost.dispatch.retries";

/// Number of fallback attempts consumed before success or exhaustion.
pub const BIFROST_DISPATCH_FALLBACKS: &str = "bifrost.dispatch.fallbacks";

/// Current number of requests in flight on a provider's worker pool.
pub const BIFROST_POOL_IN_FLIGHT: &str = "bifrost.pool.in_flight";

/// Current number of requests waiting to be scheduled on a provider pool.
pub const BIFROST_POOL_QUEUED: &str = "bifrost.pool.queued";

/// Duration of an MCP tool invocation, including plugin hooks.
pub const MCP_TOOL_CALL_DURATION: &str = "mcp.tool.call.duration";

/// Duration of listing tools visible to a request context.
pub const MCP_TOOLS_LIST_DURATION: &str = "mcp.tools.list.duration";
