//! Maps heterogeneous upstream failures onto the uniform [`ErrorField`]
//! taxonomy. Every provider transport funnels its failures through
//! here rather than inventing its own error shape, so the fallback chain
//! executor can classify retryability without knowing which upstream
//! produced the error.

use schema::{ErrorCategory, ErrorField};

/// Classifies an HTTP status code from an upstream provider response into
/// an error category. `body` is the provider's raw error payload, kept as
/// the message since structured sub-fields (error type, param) vary wildly
/// across providers and aren't worth modeling centrally.
pub fn from_http_status(status: u16, body: &str, provider_code: Option<String>) -> ErrorField {
    let category = match status {
        400 => ErrorCategory::InvalidRequest,
        401 => ErrorCategory::Authentication,
        403 => ErrorCategory::PermissionDenied,
        404 => ErrorCategory::ModelNotFound,
        408 => ErrorCategory::Timeout,
        413 => ErrorCategory::ContextLength,
        422 => ErrorCategory::InvalidRequest,
        429 => ErrorCategory::RateLimited,
        500..=599 => ErrorCategory::Upstream5xx,
        _ => ErrorCategory::ProviderUnavailable,
    };

    // Content-policy rejections come back as a 400 on most providers but
    // are not retryable the way a generic invalid-request is; providers
    // that can identify this more precisely should override the category
    // via `with_category` after calling this helper.
    let mut error = ErrorField::new(category, truncate(body));
    if let Some(code) = provider_code {
        error = error.with_code(code);
    }
    error.with_status(status)
}

/// Maps a `reqwest::Error` (connection failure, DNS, timeout, decode
/// error) onto the taxonomy. Distinguished from [`from_http_status`]
/// because these never reached a provider at all.
pub fn from_transport_error(error: &reqwest::Error) -> ErrorField {
    if error.is_timeout() {
        return ErrorField::new(ErrorCategory::Timeout, error.to_string());
    }
    if error.is_connect() {
        return ErrorField::new(ErrorCategory::ProviderUnavailable, error.to_string());
    }
    if error.is_decode() {
        return ErrorField::new(ErrorCategory::StreamProtocol, error.to_string());
    }
    ErrorField::new(ErrorCategory::ProviderUnavailable, error.to_string())
}

/// Wraps an internal bug (a `serde_json`/invariant failure that should
/// never happen) as `bifrost_internal`. This category should not
/// occur in production; every call site that reaches for this is a sign
/// the corresponding upstream behavior wasn't anticipated.
pub fn internal(message: impl Into<String>) -> ErrorField {
    ErrorField::new(ErrorCategory::BifrostInternal, message.into())
}

/// Re-tags an error as `content_policy`, non-retryable, preserving the
/// original message. Providers that expose a distinguishable content-
/// moderation error code call this after `from_http_status`.
pub fn as_content_policy(mut error: ErrorField) -> ErrorField {
    error.category = ErrorCategory::ContentPolicy;
    error.retryable = false;
    error
}

pub fn as_context_length(mut error: ErrorField) -> ErrorField {
    error.category = ErrorCategory::ContextLength;
    error.retryable = false;
    error
}

fn truncate(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        format!("{}... (truncated)", &body[..MAX])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_429_to_rate_limited_and_retryable() {
        let error = from_http_status(429, "slow down", None);
        assert_eq!(error.category, ErrorCategory::RateLimited);
        assert!(error.retryable);
    }

    #[test]
    fn maps_401_to_authentication_and_non_retryable() {
        let error = from_http_status(401, "bad key", None);
        assert_eq!(error.category, ErrorCategory::Authentication);
        assert!(!error.retryable);
    }

    #[test]
    fn maps_5xx_to_upstream_5xx_and_retryable() {
        let error = from_http_status(503, "overloaded", None);
        assert_eq!(error.category, ErrorCategory::Upstream5xx);
        assert!(error.retryable);
    }

    #[test]
    fn content_policy_override_is_not_retryable() {
        let error = as_content_policy(from_http_status(400, "blocked content", None));
        assert_eq!(error.category, ErrorCategory::ContentPolicy);
        assert!(!error.retryable);
    }

    #[test]
    fn long_body_is_truncated() {
        let body = "x".repeat(3000);
        let error = from_http_status(500, &body, None);
        assert!(error.message.len() < 3000);
    }
}
