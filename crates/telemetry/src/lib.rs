//! Ambient observability: metric names/recording helpers and span
//! attribute conventions shared across the gateway and MCP crates.
//!
//! Distributed tracing itself is `fastrace`, used directly by callers via
//! `RequestContext::new_span`; this crate only standardizes the attribute
//! keys attached to those spans and the metric names recorded alongside
//! them, so dashboards built against one provider keep working for all.

pub mod attributes;
pub mod metrics;
