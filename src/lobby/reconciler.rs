//! Lobby reconciliation
//!
//! Drives the session from whatever lobby state the server currently holds to
//! exactly one freshly created lobby:
//!
//! 1. look up the current lobby (a failed lookup counts as "none")
//! 2. tear it down: destroy, abandon unless still in setup, leave
//! 3. leave and abandon once more, unconditionally
//! 4. wait for the teardown to settle
//! 5. request one new lobby
//! 6. poll the cache until it shows a lobby or the budget runs out
//!
//! Every command is fire-and-forget: a rejected teardown or create request is
//! logged and recorded, and only a lobby that never shows up in the cache
//! fails the reconciliation.

use crate::error::{ReconcileError, Result};
use crate::lobby::clock::Sleeper;
use crate::lobby::config::LobbyConfig;
use crate::metrics::MetricsCollector;
use crate::session::{CacheQuery, SessionCommands};
use crate::types::Lobby;
use crate::utils::{current_timestamp, generate_run_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Timing and retry budget for a reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Pause before the initial lobby lookup
    pub warmup_delay: Duration,
    /// Pause between teardown and the create request
    pub settle_delay: Duration,
    /// Maximum number of cache polls after the create request
    pub poll_attempts: u32,
    /// Pause before each poll
    pub poll_interval: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            warmup_delay: Duration::from_secs(3),
            settle_delay: Duration::from_secs(3),
            poll_attempts: 5,
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl ReconcileSettings {
    /// Settings with every pause set to zero, keeping the poll budget
    pub fn immediate() -> Self {
        Self {
            warmup_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Best-effort teardown commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownStep {
    /// Destroy the lobby found in the cache
    Destroy,
    /// Abandon the match of a lobby past its setup state
    Abandon,
    /// Leave the lobby found in the cache
    Leave,
    /// Unconditional leave issued after every teardown
    FinalLeave,
    /// Unconditional abandon issued after every teardown
    FinalAbandon,
}

impl TeardownStep {
    pub fn as_str(self) -> &'static str {
        match self {
            TeardownStep::Destroy => "destroy",
            TeardownStep::Abandon => "abandon",
            TeardownStep::Leave => "leave",
            TeardownStep::FinalLeave => "final_leave",
            TeardownStep::FinalAbandon => "final_abandon",
        }
    }
}

impl std::fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A converged reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub run_id: Uuid,
    /// The lobby observed after the create request
    pub lobby: Lobby,
    /// 1-based poll attempt that observed the lobby
    pub attempts: u32,
    /// Lobby that was torn down, if one was found
    pub previous_lobby: Option<Lobby>,
    /// The initial lookup failed and was treated as "no lobby"
    pub lookup_failed: bool,
    /// Teardown commands that were rejected
    pub cleanup_failures: Vec<TeardownStep>,
    /// The create request returned an error but the lobby showed up anyway
    pub create_failed: bool,
    pub completed_at: DateTime<Utc>,
}

/// Reconciles the session's lobby state with a requested configuration
pub struct LobbyReconciler {
    session: Arc<dyn SessionCommands>,
    cache: Arc<dyn CacheQuery>,
    sleeper: Arc<dyn Sleeper>,
    settings: ReconcileSettings,
    metrics: Option<Arc<MetricsCollector>>,
}

impl LobbyReconciler {
    /// Create a new reconciler
    pub fn new(
        session: Arc<dyn SessionCommands>,
        cache: Arc<dyn CacheQuery>,
        sleeper: Arc<dyn Sleeper>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            session,
            cache,
            sleeper,
            settings,
            metrics: None,
        }
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Tear down any existing lobby and create a new one from `config`
    pub async fn reconcile(
        &self,
        config: &LobbyConfig,
    ) -> std::result::Result<ReconcileOutcome, ReconcileError> {
        let run_id = generate_run_id();
        let span = info_span!("reconcile", %run_id, lobby = %config.game_name);
        self.run(run_id, config).instrument(span).await
    }

    async fn run(
        &self,
        run_id: Uuid,
        config: &LobbyConfig,
    ) -> std::result::Result<ReconcileOutcome, ReconcileError> {
        let started = Instant::now();
        info!("Setting up lobby");

        self.sleeper.sleep(self.settings.warmup_delay).await;

        let (previous_lobby, lookup_failed) = match self.cache.current_lobby().await {
            Ok(lobby) => (lobby, false),
            Err(e) => {
                warn!(error = %e, "Failed to look up existing lobby, assuming none");
                if let Some(metrics) = &self.metrics {
                    metrics.record_lookup_failure();
                }
                (None, true)
            }
        };

        let mut cleanup_failures = Vec::new();

        if let Some(existing) = &previous_lobby {
            info!(
                lobby_id = existing.lobby_id,
                state = %existing.state,
                "Destroying old lobby"
            );

            let result = self.session.destroy_lobby().await;
            self.note_cleanup(TeardownStep::Destroy, result, &mut cleanup_failures);

            if !existing.state.is_setup() {
                let result = self.session.abandon_lobby().await;
                self.note_cleanup(TeardownStep::Abandon, result, &mut cleanup_failures);
            }

            let result = self.session.leave_lobby().await;
            self.note_cleanup(TeardownStep::Leave, result, &mut cleanup_failures);
        }

        // The session may still think it is in a lobby the cache no longer shows.
        let result = self.session.leave_lobby().await;
        self.note_cleanup(TeardownStep::FinalLeave, result, &mut cleanup_failures);
        let result = self.session.abandon_lobby().await;
        self.note_cleanup(TeardownStep::FinalAbandon, result, &mut cleanup_failures);

        self.sleeper.sleep(self.settings.settle_delay).await;

        info!("Creating new lobby");
        let create_failed = match self.session.create_lobby(config).await {
            Ok(()) => false,
            Err(e) => {
                warn!(error = %e, "Create lobby request failed, polling anyway");
                if let Some(metrics) = &self.metrics {
                    metrics.record_create_failure();
                }
                true
            }
        };

        for attempt in 1..=self.settings.poll_attempts {
            self.sleeper.sleep(self.settings.poll_interval).await;

            match self.cache.current_lobby().await {
                Ok(Some(lobby)) => {
                    info!(
                        attempt,
                        lobby_id = lobby.lobby_id,
                        state = %lobby.state,
                        "New lobby created"
                    );
                    self.record_outcome("converged", attempt, started.elapsed());
                    return Ok(ReconcileOutcome {
                        run_id,
                        lobby,
                        attempts: attempt,
                        previous_lobby,
                        lookup_failed,
                        cleanup_failures,
                        create_failed,
                        completed_at: current_timestamp(),
                    });
                }
                Ok(None) => {
                    debug!(attempt, "New lobby not yet visible in cache");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Failed to get lobby");
                }
            }
        }

        let attempts = self.settings.poll_attempts;
        error!(attempts, create_failed, "Lobby creation did not converge");
        self.record_outcome("not_converged", attempts, started.elapsed());
        Err(ReconcileError::NotConverged { attempts })
    }

    fn note_cleanup(&self, step: TeardownStep, result: Result<()>, failures: &mut Vec<TeardownStep>) {
        match result {
            Ok(()) => debug!(%step, "Teardown command accepted"),
            Err(e) => {
                warn!(%step, error = %e, "Teardown command failed, continuing");
                if let Some(metrics) = &self.metrics {
                    metrics.record_cleanup_failure(step.as_str());
                }
                failures.push(step);
            }
        }
    }

    fn record_outcome(&self, outcome: &str, attempts: u32, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.record_reconciliation(outcome, attempts, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::clock::InstantSleeper;
    use crate::session::{MockCacheQuery, MockSessionCommands};
    use crate::types::LobbyState;
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    fn test_lobby(lobby_id: u64, state: LobbyState) -> Lobby {
        Lobby {
            lobby_id,
            state,
            game_name: "lobbytest".to_string(),
            pass_key: "123".to_string(),
            members: Vec::new(),
        }
    }

    fn create_reconciler(session: MockSessionCommands, cache: MockCacheQuery) -> LobbyReconciler {
        LobbyReconciler::new(
            Arc::new(session),
            Arc::new(cache),
            Arc::new(InstantSleeper),
            ReconcileSettings::immediate(),
        )
    }

    /// Session mock that logs every command; commands named in `failing` are rejected
    fn logging_session(log: &CallLog, failing: &'static [&'static str]) -> MockSessionCommands {
        fn outcome(log: &CallLog, name: &'static str, failing: &[&str]) -> Result<()> {
            log.lock().unwrap().push(name);
            if failing.contains(&name) {
                Err(anyhow::anyhow!("{} rejected", name))
            } else {
                Ok(())
            }
        }

        let mut session = MockSessionCommands::new();
        let l = log.clone();
        session
            .expect_destroy_lobby()
            .returning(move || outcome(&l, "destroy", failing));
        let l = log.clone();
        session
            .expect_abandon_lobby()
            .returning(move || outcome(&l, "abandon", failing));
        let l = log.clone();
        session
            .expect_leave_lobby()
            .returning(move || outcome(&l, "leave", failing));
        let l = log.clone();
        session
            .expect_create_lobby()
            .returning(move |_| outcome(&l, "create", failing));
        session
    }

    /// Cache that returns each scripted response once, in order
    fn scripted_cache(responses: Vec<Result<Option<Lobby>>>) -> MockCacheQuery {
        let expected = responses.len();
        let mut responses = responses.into_iter();
        let mut cache = MockCacheQuery::new();
        cache
            .expect_current_lobby()
            .times(expected)
            .returning(move || {
                responses
                    .next()
                    .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
            });
        cache
    }

    #[tokio::test]
    async fn test_teardown_order_for_running_lobby() {
        let log = CallLog::default();
        let session = logging_session(&log, &[]);
        let cache = scripted_cache(vec![
            Ok(Some(test_lobby(1, LobbyState::Run))),
            Ok(Some(test_lobby(2, LobbyState::Ui))),
        ]);

        let reconciler = create_reconciler(session, cache);
        let outcome = reconciler.reconcile(&LobbyConfig::default()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["destroy", "abandon", "leave", "leave", "abandon", "create"]
        );
        assert_eq!(outcome.lobby.lobby_id, 2);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.previous_lobby.map(|l| l.lobby_id), Some(1));
        assert!(outcome.cleanup_failures.is_empty());
    }

    #[tokio::test]
    async fn test_setup_lobby_is_not_abandoned_before_leave() {
        let log = CallLog::default();
        let session = logging_session(&log, &[]);
        let cache = scripted_cache(vec![
            Ok(Some(test_lobby(1, LobbyState::Ui))),
            Ok(Some(test_lobby(2, LobbyState::Ui))),
        ]);

        let reconciler = create_reconciler(session, cache);
        assert!(reconciler.reconcile(&LobbyConfig::default()).await.is_ok());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["destroy", "leave", "leave", "abandon", "create"]
        );
    }

    #[tokio::test]
    async fn test_no_existing_lobby_still_runs_final_cleanup() {
        let log = CallLog::default();
        let session = logging_session(&log, &[]);
        let cache = scripted_cache(vec![Ok(None), Ok(Some(test_lobby(7, LobbyState::Ui)))]);

        let reconciler = create_reconciler(session, cache);
        let outcome = reconciler.reconcile(&LobbyConfig::default()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["leave", "abandon", "create"]);
        assert!(outcome.previous_lobby.is_none());
        assert!(!outcome.lookup_failed);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_lookup_error_is_treated_as_no_lobby() {
        let log = CallLog::default();
        let session = logging_session(&log, &[]);
        let cache = scripted_cache(vec![
            Err(anyhow::anyhow!("cache container not found")),
            Ok(Some(test_lobby(3, LobbyState::Ui))),
        ]);

        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let reconciler = create_reconciler(session, cache).with_metrics(metrics.clone());
        let outcome = reconciler.reconcile(&LobbyConfig::default()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["leave", "abandon", "create"]);
        assert!(outcome.lookup_failed);
        assert!(outcome.previous_lobby.is_none());
        assert_eq!(metrics.reconcile().lookup_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failures_are_recorded_not_fatal() {
        let log = CallLog::default();
        let session = logging_session(&log, &["destroy", "abandon"]);
        let cache = scripted_cache(vec![
            Ok(Some(test_lobby(1, LobbyState::PostGame))),
            Ok(None),
            Err(anyhow::anyhow!("transient")),
            Ok(Some(test_lobby(9, LobbyState::Ui))),
        ]);

        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let reconciler = create_reconciler(session, cache).with_metrics(metrics.clone());
        let outcome = reconciler.reconcile(&LobbyConfig::default()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["destroy", "abandon", "leave", "leave", "abandon", "create"]
        );
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.lobby.lobby_id, 9);
        assert_eq!(
            outcome.cleanup_failures,
            vec![
                TeardownStep::Destroy,
                TeardownStep::Abandon,
                TeardownStep::FinalAbandon
            ]
        );
        assert_eq!(
            metrics
                .reconcile()
                .cleanup_failures_total
                .with_label_values(&["destroy"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_polling_budget_exhausted() {
        let log = CallLog::default();
        let session = logging_session(&log, &[]);
        // one initial lookup plus five polls, none of which find a lobby
        let cache = scripted_cache(vec![
            Ok(None),
            Ok(None),
            Err(anyhow::anyhow!("transient")),
            Ok(None),
            Ok(None),
            Err(anyhow::anyhow!("transient")),
        ]);

        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let reconciler = create_reconciler(session, cache).with_metrics(metrics.clone());
        let err = reconciler
            .reconcile(&LobbyConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::NotConverged { attempts: 5 }));
        assert_eq!(
            log.lock().unwrap().iter().filter(|c| **c == "create").count(),
            1
        );
        assert_eq!(
            metrics
                .reconcile()
                .reconciliations_total
                .with_label_values(&["not_converged"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_create_still_polls_and_converges() {
        let mut session = MockSessionCommands::new();
        session.expect_leave_lobby().returning(|| Ok(()));
        session.expect_abandon_lobby().returning(|| Ok(()));
        session
            .expect_create_lobby()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("timeout waiting for ack")));
        let cache = scripted_cache(vec![Ok(None), Ok(Some(test_lobby(5, LobbyState::Ui)))]);

        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let reconciler = create_reconciler(session, cache).with_metrics(metrics.clone());
        let outcome = reconciler.reconcile(&LobbyConfig::default()).await.unwrap();

        assert_eq!(outcome.lobby.lobby_id, 5);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.create_failed);
        assert_eq!(metrics.reconcile().create_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_failed_create_that_never_lands_is_not_converged() {
        let log = CallLog::default();
        let session = logging_session(&log, &["create"]);
        // initial lookup plus the full poll budget
        let cache = scripted_cache((0..6).map(|_| Ok(None)).collect());

        let reconciler = create_reconciler(session, cache);
        let err = reconciler
            .reconcile(&LobbyConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::NotConverged { attempts: 5 }));
    }

    #[tokio::test]
    async fn test_create_carries_requested_config() {
        let mut session = MockSessionCommands::new();
        session.expect_leave_lobby().returning(|| Ok(()));
        session.expect_abandon_lobby().returning(|| Ok(()));
        session
            .expect_create_lobby()
            .withf(|config| config.game_name == "scrim" && config.pass_key == "s3cret")
            .times(1)
            .returning(|_| Ok(()));

        let cache = scripted_cache(vec![Ok(None), Ok(Some(test_lobby(4, LobbyState::Ui)))]);

        let reconciler = create_reconciler(session, cache);
        let config = LobbyConfig::named("scrim").with_pass_key("s3cret");
        assert!(reconciler.reconcile(&config).await.is_ok());
    }

    #[test]
    fn test_default_settings() {
        let settings = ReconcileSettings::default();
        assert_eq!(settings.poll_attempts, 5);
        assert_eq!(settings.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.settle_delay, Duration::from_secs(3));

        let immediate = ReconcileSettings::immediate();
        assert_eq!(immediate.poll_attempts, 5);
        assert!(immediate.poll_interval.is_zero());
    }
}
