//! Counters

use super::labels;

pub fn connections_opened() {
    metrics::counter!("firebird_wire_connections_opened_total").increment(1);
}

pub fn connections_closed() {
    metrics::counter!("firebird_wire_connections_closed_total").increment(1);
}

/// Outcome of an identify exchange
pub fn identify_completed(outcome: &'static str, protocol: Option<i32>) {
    let protocol = protocol.map_or_else(|| "none".to_string(), |v| v.to_string());
    metrics::counter!(
        "firebird_wire_identify_total",
        labels::OUTCOME => outcome,
        labels::PROTOCOL => protocol
    )
    .increment(1);
}

pub fn auth_attempted(plugin: &str) {
    metrics::counter!(
        "firebird_wire_auth_attempted_total",
        labels::PLUGIN => plugin.to_string()
    )
    .increment(1);
}

pub fn auth_successful(plugin: &str) {
    metrics::counter!(
        "firebird_wire_auth_successful_total",
        labels::PLUGIN => plugin.to_string()
    )
    .increment(1);
}

pub fn auth_failed(plugin: &str, reason: &'static str) {
    metrics::counter!(
        "firebird_wire_auth_failed_total",
        labels::PLUGIN => plugin.to_string(),
        labels::REASON => reason
    )
    .increment(1);
}

pub fn encryption_established(plugin: &str) {
    metrics::counter!(
        "firebird_wire_encryption_established_total",
        labels::PLUGIN => plugin.to_string()
    )
    .increment(1);
}

pub fn encryption_failed(plugin: &str, reason: &'static str) {
    metrics::counter!(
        "firebird_wire_encryption_failed_total",
        labels::PLUGIN => plugin.to_string(),
        labels::REASON => reason
    )
    .increment(1);
}

/// Server warnings delivered to the warning callback
pub fn server_warning() {
    metrics::counter!("firebird_wire_server_warnings_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_without_recorder() {
        connections_opened();
        identify_completed(labels::OUTCOME_SUCCESS, Some(13));
        auth_attempted("Srp256");
        auth_failed("Srp256", labels::REASON_SERVER_ERROR);
        encryption_failed("Arc4", labels::REASON_PLUGIN_ERROR);
        connections_closed();
    }
}
