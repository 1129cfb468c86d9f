//! Metrics for the lobby warden
//!
//! Prometheus counters and histograms covering reconciliation, the invite
//! follow-up and the presence heartbeat.

pub mod collector;

pub use collector::{MetricsCollector, MetricsTimer, ReconcileMetrics, SessionMetrics};
