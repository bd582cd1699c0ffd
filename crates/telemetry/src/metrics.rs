pub mod names;

use std::sync::OnceLock;

use opentelemetry::{KeyValue, global, metrics::Meter};

fn meter() -> &'static Meter {
    static METER: OnceLock<Meter> = OnceLock::new();
    METER.get_or_init(|| global::meter("bifrost"))
}

/// Records a duration histogram in milliseconds with the given attributes.
pub fn record_duration_ms(name: &'static str, millis: f64, attributes: &[KeyValue]) {
    meter().f64_histogram(name).build().record(millis, attributes);
}

/// Increments a counter by `value` with the given attributes.
pub fn add(name: &'static str, value: u64, attributes: &[KeyValue]) {
    meter().u64_counter(name).build().add(value, attributes);
}

/// Sets an up/down gauge-like counter (delta), used for in-flight/queued
/// pool depth tracking.
pub fn add_signed(name: &'static str, delta: i64, attributes: &[KeyValue]) {
    meter().i64_up_down_counter(name).build().add(delta, attributes);
}
