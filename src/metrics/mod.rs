//! Metrics emitted by the wire engine
//!
//! Recorded through the `metrics` facade; nothing is collected unless the
//! application installs a recorder.

pub mod counters;
pub mod histograms;
pub mod labels;
