//! Shared `reqwest::Client` construction for provider transports.
//!
//! One client per provider (not a single process-wide client) so each
//! provider's connection pool is isolated: a slow/misbehaving upstream
//! can't exhaust connections destined for another provider sharing the
//! same pool-idle-timeout budget.

use std::time::Duration;

use config::NetworkConfig;
use http::HeaderMap;

pub fn build(network: &NetworkConfig) -> reqwest::Client {
    let mut headers = HeaderMap::new();
    headers.insert(http::header::CONNECTION, http::HeaderValue::from_static("keep-alive"));

    reqwest::Client::builder()
        .timeout(network.timeout)
        // Idle connections are recycled after 5s so DNS/record changes for
        // an upstream get picked up without needing a TTL on the pool
        // itself, which `reqwest`/hyper don't expose.
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
        .build()
        .expect("provider HTTP client configuration is always valid")
}
