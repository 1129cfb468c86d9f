//! Metrics collection using Prometheus
//!
//! Counters and histograms for reconciliation runs, the invite follow-up and
//! the presence heartbeat.

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the lobby warden
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Reconciliation metrics
    reconcile_metrics: ReconcileMetrics,

    /// Invite, launch and heartbeat metrics
    session_metrics: SessionMetrics,
}

/// Reconciliation metrics
#[derive(Clone)]
pub struct ReconcileMetrics {
    /// Reconciliation runs by outcome (converged, not_converged)
    pub reconciliations_total: IntCounterVec,

    /// Poll attempts needed before the cache reflected the new lobby
    pub poll_attempts: Histogram,

    /// Cache lookups that failed and were treated as "no lobby"
    pub lookup_failures_total: IntCounter,

    /// Best-effort teardown commands that failed, by step
    pub cleanup_failures_total: IntCounterVec,

    /// Create requests that returned an error; polling continued regardless
    pub create_failures_total: IntCounter,

    /// Wall-clock duration of a reconciliation
    pub reconcile_duration: Histogram,
}

/// Session follow-up metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Invitations sent by status
    pub invites_total: IntCounterVec,

    /// Launch requests by status
    pub launches_total: IntCounterVec,

    /// Heartbeat hellos by status
    pub heartbeats_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a metrics collector with an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let reconcile_metrics = ReconcileMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;

        Ok(Self {
            registry,
            reconcile_metrics,
            session_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get reconciliation metrics
    pub fn reconcile(&self) -> &ReconcileMetrics {
        &self.reconcile_metrics
    }

    /// Get session metrics
    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    /// Record a finished reconciliation
    pub fn record_reconciliation(&self, outcome: &str, attempts: u32, duration: Duration) {
        self.reconcile_metrics
            .reconciliations_total
            .with_label_values(&[outcome])
            .inc();

        if attempts > 0 {
            self.reconcile_metrics
                .poll_attempts
                .observe(f64::from(attempts));
        }

        self.reconcile_metrics
            .reconcile_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a cache lookup failure that was absorbed
    pub fn record_lookup_failure(&self) {
        self.reconcile_metrics.lookup_failures_total.inc();
    }

    /// Record a create request that returned an error
    pub fn record_create_failure(&self) {
        self.reconcile_metrics.create_failures_total.inc();
    }

    /// Record a failed best-effort teardown command
    pub fn record_cleanup_failure(&self, step: &str) {
        self.reconcile_metrics
            .cleanup_failures_total
            .with_label_values(&[step])
            .inc();
    }

    /// Record an invitation attempt
    pub fn record_invite(&self, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.session_metrics
            .invites_total
            .with_label_values(&[status])
            .inc();
    }

    /// Record a launch attempt
    pub fn record_launch(&self, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.session_metrics
            .launches_total
            .with_label_values(&[status])
            .inc();
    }

    /// Record a heartbeat hello
    pub fn record_heartbeat(&self, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.session_metrics
            .heartbeats_total
            .with_label_values(&[status])
            .inc();
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ReconcileMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let reconciliations_total = IntCounterVec::new(
            Opts::new(
                "lobby_warden_reconciliations_total",
                "Total lobby reconciliations by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(reconciliations_total.clone()))?;

        let poll_attempts = Histogram::with_opts(
            HistogramOpts::new(
                "lobby_warden_poll_attempts",
                "Poll attempts before the new lobby was observed",
            )
            .buckets(vec![1.0, 2.0, 3.0, 4.0, 5.0, 8.0, 13.0]),
        )?;
        registry.register(Box::new(poll_attempts.clone()))?;

        let lookup_failures_total = IntCounter::new(
            "lobby_warden_lookup_failures_total",
            "Cache lookups that failed and were treated as no lobby",
        )?;
        registry.register(Box::new(lookup_failures_total.clone()))?;

        let cleanup_failures_total = IntCounterVec::new(
            Opts::new(
                "lobby_warden_cleanup_failures_total",
                "Best-effort teardown commands that failed",
            ),
            &["step"],
        )?;
        registry.register(Box::new(cleanup_failures_total.clone()))?;

        let create_failures_total = IntCounter::new(
            "lobby_warden_create_failures_total",
            "Create lobby requests that returned an error",
        )?;
        registry.register(Box::new(create_failures_total.clone()))?;

        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new(
                "lobby_warden_reconcile_duration_seconds",
                "Time taken by a lobby reconciliation",
            )
            .buckets(vec![0.1, 1.0, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        Ok(Self {
            reconciliations_total,
            poll_attempts,
            lookup_failures_total,
            cleanup_failures_total,
            create_failures_total,
            reconcile_duration,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let invites_total = IntCounterVec::new(
            Opts::new("lobby_warden_invites_total", "Member invitations sent"),
            &["status"],
        )?;
        registry.register(Box::new(invites_total.clone()))?;

        let launches_total = IntCounterVec::new(
            Opts::new("lobby_warden_launches_total", "Lobby launch requests"),
            &["status"],
        )?;
        registry.register(Box::new(launches_total.clone()))?;

        let heartbeats_total = IntCounterVec::new(
            Opts::new("lobby_warden_heartbeats_total", "Presence hellos sent"),
            &["status"],
        )?;
        registry.register(Box::new(heartbeats_total.clone()))?;

        Ok(Self {
            invites_total,
            launches_total,
            heartbeats_total,
        })
    }
}
