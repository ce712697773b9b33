//! Histograms

use super::labels;
use std::time::Duration;

/// Socket connect through attach
pub fn handshake_duration(protocol: i32, duration: Duration) {
    metrics::histogram!(
        "firebird_wire_handshake_duration_ms",
        labels::PROTOCOL => protocol.to_string()
    )
    .record(duration.as_secs_f64() * 1000.0);
}

/// Plugin exchange from the first client data to the final response
pub fn auth_duration(plugin: &str, duration: Duration) {
    metrics::histogram!(
        "firebird_wire_auth_duration_ms",
        labels::PLUGIN => plugin.to_string()
    )
    .record(duration.as_secs_f64() * 1000.0);
}
