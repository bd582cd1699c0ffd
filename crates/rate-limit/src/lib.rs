//! Token-bucket rate limiting keyed by (client, provider, model).
//!
//! [`TokenRateLimitManager`] holds one [`governor`] limiter per key, lazily
//! created and evicted after inactivity by a [`mini_moka`] cache so a
//! gateway with thousands of distinct clients doesn't leak memory. Limits
//! themselves come from configuration (provider-level, optionally narrowed
//! by a model-level override) and are enforced against the token count of
//! the *incoming* request, not individual completion tokens as they stream
//! out, since the whole point is to reject before dispatching upstream.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};
use mini_moka::sync::Cache;
use serde::{Deserialize, Serialize};

/// Per-scope token budget. Both fields are optional: `None` means "no limit
/// at this scope", so a provider can cap overall throughput while leaving
/// individual models unrestricted, or vice versa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRateLimitsConfig {
    /// Maximum tokens admitted per rolling minute.
    pub tokens_per_minute: Option<u32>,
    /// Maximum burst size, i.e. the largest single request that can ever be
    /// admitted regardless of how empty the bucket is. Defaults to
    /// `tokens_per_minute` when unset.
    pub burst: Option<u32>,
}

impl TokenRateLimitsConfig {
    fn quota(&self) -> Option<Quota> {
        let per_minute = NonZeroU32::new(self.tokens_per_minute?)?;
        let burst = self
            .burst
            .and_then(NonZeroU32::new)
            .unwrap_or(per_minute);
        Some(Quota::per_minute(per_minute).allow_burst(burst))
    }
}

/// A single rate-limit check, identifying both the caller and the target
/// the tokens would be spent against.
#[derive(Debug, Clone)]
pub struct TokenRateLimitRequest {
    pub client_id: String,
    pub group: Option<String>,
    pub provider: String,
    pub model: Option<String>,
    pub input_tokens: u32,
}

impl TokenRateLimitRequest {
    fn key(&self) -> String {
        match (&self.group, &self.model) {
            (Some(group), Some(model)) => {
                format!("{}/{group}/{}/{model}", self.client_id, self.provider)
            }
            (Some(group), None) => format!("{}/{group}/{}", self.client_id, self.provider),
            (None, Some(model)) => format!("{}/{}/{model}", self.client_id, self.provider),
            (None, None) => format!("{}/{}", self.client_id, self.provider),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("rate limit state corrupted: {0}")]
    State(&'static str),
}

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Owns one limiter per (client, provider, model) key, evicting idle ones
/// after ten minutes so long-lived gateways don't accumulate an unbounded
/// number of buckets for clients that stopped sending traffic.
pub struct TokenRateLimitManager {
    limiters: Cache<String, Arc<Limiter>>,
}

impl Default for TokenRateLimitManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRateLimitManager {
    pub fn new() -> Self {
        Self {
            limiters: Cache::builder()
                .time_to_idle(Duration::from_secs(600))
                .build(),
        }
    }

    /// Checks whether `request` is admitted under the tighter of
    /// `provider_limits` and `model_limits`.
    ///
    /// Returns `Ok(None)` when the request is admitted immediately,
    /// `Ok(Some(duration))` when the caller should wait `duration` before
    /// retrying, and `Ok(Some(Duration::MAX))` when the request can never
    /// succeed because it asks for more tokens than the bucket's burst
    /// capacity allows even when full.
    pub async fn check_request(
        &self,
        request: &TokenRateLimitRequest,
        provider_limits: Option<TokenRateLimitsConfig>,
        model_limits: Option<TokenRateLimitsConfig>,
    ) -> Result<Option<Duration>, Error> {
        let Some(quota) = tightest_quota(provider_limits, model_limits) else {
            return Ok(None);
        };

        let Some(tokens) = NonZeroU32::new(request.input_tokens) else {
            return Ok(None);
        };

        let limiter = self.limiter_for(request.key(), quota);

        match limiter.check_n(tokens) {
            Ok(Ok(())) => Ok(None),
            Ok(Err(not_until)) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                Ok(Some(wait))
            }
            // `tokens` exceeds the bucket's maximum burst capacity: no wait
            // will ever admit it.
            Err(_insufficient_capacity) => Ok(Some(Duration::MAX)),
        }
    }

    fn limiter_for(&self, key: String, quota: Quota) -> Arc<Limiter> {
        if let Some(existing) = self.limiters.get(&key) {
            return existing;
        }
        let limiter = Arc::new(RateLimiter::direct(quota));
        self.limiters.insert(key, limiter.clone());
        limiter
    }
}

fn tightest_quota(
    provider: Option<TokenRateLimitsConfig>,
    model: Option<TokenRateLimitsConfig>,
) -> Option<Quota> {
    let provider = provider.and_then(|c| c.quota());
    let model = model.and_then(|c| c.quota());
    match (provider, model) {
        (Some(a), Some(b)) => Some(tighter(a, b)),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

fn tighter(a: Quota, b: Quota) -> Quota {
    if a.burst_size() <= b.burst_size() { a } else { b }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(input_tokens: u32) -> TokenRateLimitRequest {
        TokenRateLimitRequest {
            client_id: "client-a".to_string(),
            group: None,
            provider: "openai".to_string(),
            model: Some("gpt-4o".to_string()),
            input_tokens,
        }
    }

    #[tokio::test]
    async fn no_limits_configured_always_admits() {
        let manager = TokenRateLimitManager::new();
        let result = manager.check_request(&request(1_000_000), None, None).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn within_burst_is_admitted_once() {
        let manager = TokenRateLimitManager::new();
        let limits = TokenRateLimitsConfig {
            tokens_per_minute: Some(1000),
            burst: Some(1000),
        };
        let first = manager
            .check_request(&request(600), Some(limits), None)
            .await
            .unwrap();
        assert_eq!(first, None);
    }

    #[tokio::test]
    async fn exceeding_burst_after_admission_requires_wait() {
        let manager = TokenRateLimitManager::new();
        let limits = TokenRateLimitsConfig {
            tokens_per_minute: Some(600),
            burst: Some(600),
        };
        manager
            .check_request(&request(600), Some(limits), None)
            .await
            .unwrap();
        let second = manager
            .check_request(&request(1), Some(limits), None)
            .await
            .unwrap();
        assert!(matches!(second, Some(d) if d < Duration::MAX));
    }

    #[tokio::test]
    async fn request_larger_than_burst_never_succeeds() {
        let manager = TokenRateLimitManager::new();
        let limits = TokenRateLimitsConfig {
            tokens_per_minute: Some(100),
            burst: Some(100),
        };
        let result = manager
            .check_request(&request(500), Some(limits), None)
            .await
            .unwrap();
        assert_eq!(result, Some(Duration::MAX));
    }

    #[tokio::test]
    async fn model_limit_overrides_looser_provider_limit() {
        let manager = TokenRateLimitManager::new();
        let provider_limits = TokenRateLimitsConfig {
            tokens_per_minute: Some(100_000),
            burst: Some(100_000),
        };
        let model_limits = TokenRateLimitsConfig {
            tokens_per_minute: Some(50),
            burst: Some(50),
        };
        let result = manager
            .check_request(&request(500), Some(provider_limits), Some(model_limits))
            .await
            .unwrap();
        assert_eq!(result, Some(Duration::MAX));
    }
}
