//! Label keys and fixed label values

pub const PLUGIN: &str = "plugin";
pub const REASON: &str = "reason";
pub const PROTOCOL: &str = "protocol";
pub const OUTCOME: &str = "outcome";

pub const REASON_SERVER_ERROR: &str = "server_error";
pub const REASON_NO_PLUGIN: &str = "no_plugin";
pub const REASON_PLUGIN_ERROR: &str = "plugin_error";

pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_ERROR: &str = "error";

/// Plugin label used before any plugin was selected
pub const PLUGIN_UNKNOWN: &str = "unknown";
