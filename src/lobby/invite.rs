//! Post-reconciliation member handling
//!
//! Once a lobby exists the host frees its own team slot, invites the
//! configured members, gives the invitations time to land and launches the
//! lobby. None of these commands wait for an acknowledgement.

use crate::error::{Result, WardenError};
use crate::lobby::clock::Sleeper;
use crate::metrics::MetricsCollector;
use crate::session::SessionCommands;
use crate::types::{AccountId, SteamId};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What the invite follow-up should do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteSettings {
    /// Move the local account out of its team slot before inviting
    pub kick_self: bool,
    /// Members to invite, in order
    pub invitees: Vec<SteamId>,
    /// Pause between the last invitation and the launch
    pub launch_delay: Duration,
    /// Launch the lobby at the end
    pub launch: bool,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            kick_self: true,
            invitees: Vec::new(),
            launch_delay: Duration::from_secs(10),
            launch: true,
        }
    }
}

/// Result of the invite follow-up
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InviteReport {
    /// The self-kick was rejected
    pub kick_failed: bool,
    pub invited: Vec<SteamId>,
    pub failed_invites: Vec<SteamId>,
    pub launched: bool,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Runs the kick, invite and launch sequence against a session
pub struct MemberInviter {
    session: Arc<dyn SessionCommands>,
    sleeper: Arc<dyn Sleeper>,
    settings: InviteSettings,
    metrics: Option<Arc<MetricsCollector>>,
}

impl MemberInviter {
    pub fn new(
        session: Arc<dyn SessionCommands>,
        sleeper: Arc<dyn Sleeper>,
        settings: InviteSettings,
    ) -> Self {
        Self {
            session,
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

    /// Kick `own_account` from its slot, invite members, then launch
    ///
    /// Kick and invite failures are logged and reported. A rejected launch is
    /// returned as an error since the lobby would sit idle otherwise.
    pub async fn run(&self, own_account: AccountId) -> Result<InviteReport> {
        let mut report = InviteReport::default();

        if self.settings.kick_self {
            if let Err(e) = self.session.kick_member(own_account).await {
                warn!(account_id = own_account, error = %e, "Failed to free own team slot");
                report.kick_failed = true;
            }
        }

        info!(count = self.settings.invitees.len(), "Inviting members");
        for &member in &self.settings.invitees {
            match self.session.invite_member(member).await {
                Ok(()) => {
                    report.invited.push(member);
                    self.record_invite(true);
                }
                Err(e) => {
                    warn!(%member, error = %e, "Failed to invite member");
                    report.failed_invites.push(member);
                    self.record_invite(false);
                }
            }
        }

        if self.settings.launch {
            self.sleeper.sleep(self.settings.launch_delay).await;

            info!("Launching lobby");
            let launched = self.session.launch_lobby().await;
            if let Some(metrics) = &self.metrics {
                metrics.record_launch(launched.is_ok());
            }
            launched.map_err(|e| WardenError::CommandFailed {
                command: "launch_lobby".to_string(),
                message: e.to_string(),
            })?;
            report.launched = true;
        }

        report.finished_at = Some(current_timestamp());
        Ok(report)
    }

    fn record_invite(&self, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_invite(success);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::clock::InstantSleeper;
    use crate::session::MockSessionCommands;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn settings_with(invitees: Vec<SteamId>) -> InviteSettings {
        InviteSettings {
            invitees,
            launch_delay: Duration::ZERO,
            ..InviteSettings::default()
        }
    }

    #[tokio::test]
    async fn test_kick_invite_launch_order() {
        let mut seq = Sequence::new();
        let mut session = MockSessionCommands::new();
        session
            .expect_kick_member()
            .with(eq(42))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        session
            .expect_invite_member()
            .with(eq(SteamId(76561198113427529)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        session
            .expect_launch_lobby()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let inviter = MemberInviter::new(
            Arc::new(session),
            Arc::new(InstantSleeper),
            settings_with(vec![SteamId(76561198113427529)]),
        );

        let report = inviter.run(42).await.unwrap();
        assert!(!report.kick_failed);
        assert_eq!(report.invited, vec![SteamId(76561198113427529)]);
        assert!(report.launched);
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_invite_failures_do_not_stop_launch() {
        let mut session = MockSessionCommands::new();
        session
            .expect_kick_member()
            .returning(|_| Err(anyhow::anyhow!("not in a team")));
        session
            .expect_invite_member()
            .with(eq(SteamId(1)))
            .returning(|_| Err(anyhow::anyhow!("unknown member")));
        session
            .expect_invite_member()
            .with(eq(SteamId(2)))
            .returning(|_| Ok(()));
        session.expect_launch_lobby().times(1).returning(|| Ok(()));

        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let inviter = MemberInviter::new(
            Arc::new(session),
            Arc::new(InstantSleeper),
            settings_with(vec![SteamId(1), SteamId(2)]),
        )
        .with_metrics(metrics.clone());

        let report = inviter.run(7).await.unwrap();
        assert!(report.kick_failed);
        assert_eq!(report.failed_invites, vec![SteamId(1)]);
        assert_eq!(report.invited, vec![SteamId(2)]);
        assert!(report.launched);
        assert_eq!(
            metrics
                .session()
                .invites_total
                .with_label_values(&["failed"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_launch_failure_is_an_error() {
        let mut session = MockSessionCommands::new();
        session.expect_kick_member().returning(|_| Ok(()));
        session
            .expect_launch_lobby()
            .returning(|| Err(anyhow::anyhow!("lobby not ready")));

        let inviter = MemberInviter::new(
            Arc::new(session),
            Arc::new(InstantSleeper),
            settings_with(Vec::new()),
        );

        let err = inviter.run(7).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WardenError>(),
            Some(WardenError::CommandFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_kick_no_launch() {
        let mut session = MockSessionCommands::new();
        session.expect_kick_member().never();
        session.expect_launch_lobby().never();
        session.expect_invite_member().times(1).returning(|_| Ok(()));

        let settings = InviteSettings {
            kick_self: false,
            launch: false,
            ..settings_with(vec![SteamId(5)])
        };
        let inviter = MemberInviter::new(Arc::new(session), Arc::new(InstantSleeper), settings);

        let report = inviter.run(7).await.unwrap();
        assert!(!report.launched);
        assert_eq!(report.invited, vec![SteamId(5)]);
    }
}
