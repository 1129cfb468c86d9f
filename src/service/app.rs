//! Session workflow coordination
//!
//! This module contains the orchestrator that runs one complete lobby
//! session: announce presence, keep the heartbeat going, reconcile the lobby
//! and run the invite follow-up.

use crate::config::AppConfig;
use crate::error::ReconcileError;
use crate::lobby::clock::{Sleeper, TokioSleeper};
use crate::lobby::invite::{InviteReport, MemberInviter};
use crate::lobby::reconciler::{LobbyReconciler, ReconcileOutcome};
use crate::metrics::MetricsCollector;
use crate::presence::PresenceHeartbeat;
use crate::session::{
    CacheQuery, PresenceSignal, SessionCommands, SimulatedCoordinator,
};
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Invite follow-up failed: {message}")]
    FollowUp { message: String },
}

/// The collaborators of one session
#[derive(Clone)]
pub struct SessionHandles {
    pub commands: Arc<dyn SessionCommands>,
    pub cache: Arc<dyn CacheQuery>,
    pub presence: Arc<dyn PresenceSignal>,
    /// Account of the local user, freed from its team slot before invites
    pub own_account: AccountId,
}

impl SessionHandles {
    /// Use the simulated coordinator for every collaborator
    pub fn simulated(coordinator: Arc<SimulatedCoordinator>) -> Self {
        Self {
            own_account: coordinator.settings().own_account,
            commands: coordinator.clone(),
            cache: coordinator.clone(),
            presence: coordinator,
        }
    }
}

/// What a completed session did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub reconcile: ReconcileOutcome,
    pub invite: InviteReport,
    /// Heartbeat hellos sent while the session ran
    pub hellos_sent: u64,
}

/// Runs one lobby session end to end
pub struct LobbyOrchestrator {
    config: AppConfig,
    handles: SessionHandles,
    sleeper: Arc<dyn Sleeper>,
    metrics: Arc<MetricsCollector>,
}

impl LobbyOrchestrator {
    /// Create an orchestrator over the given collaborators
    pub fn new(
        config: AppConfig,
        handles: SessionHandles,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, ServiceError> {
        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(
            MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            })?,
        );

        Ok(Self {
            config,
            handles,
            sleeper,
            metrics,
        })
    }

    /// Create an orchestrator backed by a fresh simulated coordinator
    pub fn simulated(
        config: AppConfig,
    ) -> Result<(Self, Arc<SimulatedCoordinator>), ServiceError> {
        let coordinator = Arc::new(SimulatedCoordinator::new(config.simulation.clone()));
        let handles = SessionHandles::simulated(coordinator.clone());
        let orchestrator = Self::new(config, handles, Arc::new(TokioSleeper))?;
        Ok((orchestrator, coordinator))
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the metrics collector
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Run the session to completion
    pub async fn run(&self) -> Result<SessionReport, ServiceError> {
        let presence = &self.handles.presence;
        let timer = self.metrics.start_timer();

        if let Err(e) = presence.set_playing(true).await {
            warn!(error = %e, "Failed to announce playing state");
        }
        self.sleeper.sleep(self.config.startup_delay()).await;
        if let Err(e) = presence.say_hello().await {
            warn!(error = %e, "Initial hello failed");
        }

        let heartbeat = PresenceHeartbeat::spawn(
            presence.clone(),
            self.config.heartbeat_interval(),
            Some(self.metrics.clone()),
        );

        let result = self.lobby_workflow().await;
        let hellos_sent = heartbeat.stop().await;

        let (reconcile, invite) = result?;
        info!(
            lobby_id = reconcile.lobby.lobby_id,
            invited = invite.invited.len(),
            launched = invite.launched,
            elapsed_ms = timer.stop().as_millis() as u64,
            "Lobby session completed"
        );

        Ok(SessionReport {
            reconcile,
            invite,
            hellos_sent,
        })
    }

    /// Run the session unless `shutdown` resolves first
    ///
    /// Returns `Ok(None)` when interrupted; the in-flight workflow is dropped
    /// and the heartbeat task exits with it.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<Option<SessionReport>, ServiceError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            report = self.run() => report.map(Some),
            _ = shutdown => {
                warn!("Session interrupted before completion");
                Ok(None)
            }
        }
    }

    async fn lobby_workflow(&self) -> Result<(ReconcileOutcome, InviteReport), ServiceError> {
        let reconciler = LobbyReconciler::new(
            self.handles.commands.clone(),
            self.handles.cache.clone(),
            self.sleeper.clone(),
            self.config.reconcile_settings(),
        )
        .with_metrics(self.metrics.clone());

        let outcome = reconciler.reconcile(&self.config.lobby).await?;

        self.sleeper.sleep(self.config.post_create_delay()).await;

        let inviter = MemberInviter::new(
            self.handles.commands.clone(),
            self.sleeper.clone(),
            self.config.invite_settings(),
        )
        .with_metrics(self.metrics.clone());

        let invite = inviter
            .run(self.handles.own_account)
            .await
            .map_err(|e| ServiceError::FollowUp {
                message: e.to_string(),
            })?;

        Ok((outcome, invite))
    }
}
