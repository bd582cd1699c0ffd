//! HTTP server configuration settings.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::{ClientIdentificationConfig, HealthConfig};

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// Health endpoint configuration.
    pub health: HealthConfig,
    /// Client identification configuration for per-client token rate limiting.
    pub client_identification: ClientIdentificationConfig,
}
