//! Telemetry configuration: service identity attached to emitted spans and
//! metrics. Exporter wiring (OTLP endpoint, batching) is left to the
//! deployment environment via the usual `OTEL_EXPORTER_OTLP_*` variables
//! rather than duplicated here.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    pub service_name: Option<String>,
    pub resource_attributes: BTreeMap<String, String>,
}
