//! The uniform error taxonomy every upstream failure is normalized into.

use serde::{Deserialize, Serialize};

/// Closed set of error categories every upstream failure is normalized
/// into. `retryable` on [`ErrorField`] is derived from this category (see
/// [`ErrorCategory::default_retryable`]) but may be overridden per error,
/// e.g. a `rate_limited` whose remaining budget is known to be insufficient
/// even after backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Timeout,
    RateLimited,
    Authentication,
    PermissionDenied,
    InvalidRequest,
    ModelNotFound,
    UnsupportedOperation,
    ProviderUnavailable,
    Upstream5xx,
    BifrostInternal,
    ContentPolicy,
    ContextLength,
    ToolExecution,
    StreamProtocol,
}

impl ErrorCategory {
    /// Whether the dispatcher should classify this category as
    /// retryable-on-another-provider by default, absent a more specific
    /// override on the concrete error. See the fallback-chain contract.
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::ProviderUnavailable | Self::ModelNotFound | Self::UnsupportedOperation | Self::Upstream5xx
        )
    }

    /// Whether the dispatcher should backoff-retry this category in place
    /// against the same provider before moving on, per spec's recovery
    /// policy. Narrower than [`Self::default_retryable`]: `model_not_found`
    /// and `unsupported_operation` are still retryable-on-another-provider
    /// (the fallback chain still moves on to the next target) but retrying
    /// the same provider gains nothing when it has already said it
    /// doesn't have the model or doesn't support the operation, so those
    /// two fall back immediately instead of spending the in-place retry
    /// budget first.
    pub fn backoff_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::ProviderUnavailable | Self::Upstream5xx)
    }
}

/// A normalized error, the only error shape that ever crosses a public API
/// boundary. Provider-specific detail is preserved in `code`/`message`
/// rather than discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorField {
    pub category: ErrorCategory,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
    pub retryable: bool,
}

impl ErrorField {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            code: None,
            message: message.into(),
            status: None,
            retryable: category.default_retryable(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::UnsupportedOperation, message).with_code("unsupported_operation")
    }

    pub fn tool_removed() -> Self {
        Self::new(ErrorCategory::ToolExecution, "tool was removed before execution completed")
            .with_code("tool_removed")
            .with_retryable(false)
    }
}

impl std::fmt::Display for ErrorField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.category, self.message)
    }
}

impl std::error::Error for ErrorField {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_policy_is_not_retryable_by_default() {
        let err = ErrorField::new(ErrorCategory::ContentPolicy, "blocked");
        assert!(!err.retryable);
    }

    #[test]
    fn rate_limited_is_retryable_by_default() {
        let err = ErrorField::new(ErrorCategory::RateLimited, "slow down");
        assert!(err.retryable);
    }

    #[test]
    fn tool_removed_is_not_retryable() {
        assert!(!ErrorField::tool_removed().retryable);
        assert_eq!(ErrorField::tool_removed().code.as_deref(), Some("tool_removed"));
    }
}
