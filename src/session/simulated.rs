//! In-memory game coordinator
//!
//! Implements every session trait against local state so the full workflow
//! can run without a network session. The cache view is eventually
//! consistent: a newly created lobby only becomes visible after a configured
//! number of lookups have missed it.

use crate::error::{Result, WardenError};
use crate::lobby::config::LobbyConfig;
use crate::session::{CacheQuery, PresenceSignal, SessionCommands};
use crate::types::{AccountId, Lobby, LobbyId, LobbyMember, LobbyState, SteamId, TeamSlot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Behaviour knobs for the simulated coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Account id of the local user
    pub own_account: AccountId,
    /// Lookups after a create that still miss the new lobby
    pub convergence_lag: u32,
    /// State of a stale lobby present at startup, if any
    pub stale_lobby_state: Option<LobbyState>,
    /// Number of initial lookups that fail
    pub failing_lookups: u32,
    /// Reject every create request
    pub reject_create: bool,
    /// Apply create requests but report them as failed
    pub lose_create_ack: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            own_account: 1,
            convergence_lag: 1,
            stale_lobby_state: None,
            failing_lookups: 0,
            reject_create: false,
            lose_create_ack: false,
        }
    }
}

#[derive(Debug)]
struct PendingLobby {
    lobby: Lobby,
    misses_left: u32,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    lobby: Option<Lobby>,
    pending: Option<PendingLobby>,
    next_lobby_id: LobbyId,
    failing_lookups_left: u32,
    commands: Vec<&'static str>,
    invited: Vec<SteamId>,
    hellos: u64,
    playing: bool,
}

/// Simulated coordinator session and cache
#[derive(Debug)]
pub struct SimulatedCoordinator {
    settings: SimulationSettings,
    state: Mutex<CoordinatorState>,
}

impl SimulatedCoordinator {
    /// Create a coordinator, seeding a stale lobby if configured
    pub fn new(settings: SimulationSettings) -> Self {
        let mut state = CoordinatorState {
            next_lobby_id: 1000,
            failing_lookups_left: settings.failing_lookups,
            ..CoordinatorState::default()
        };

        if let Some(stale_state) = settings.stale_lobby_state {
            state.lobby = Some(Lobby {
                lobby_id: 999,
                state: stale_state,
                game_name: "stale".to_string(),
                pass_key: String::new(),
                members: vec![LobbyMember {
                    account_id: settings.own_account,
                    team: TeamSlot::Radiant,
                }],
            });
        }

        Self {
            settings,
            state: Mutex::new(state),
        }
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<&'static str> {
        self.lock().map(|s| s.commands.clone()).unwrap_or_default()
    }

    /// Number of create requests accepted or rejected
    pub fn create_count(&self) -> usize {
        self.commands().iter().filter(|c| **c == "create").count()
    }

    /// The lobby as currently applied, ignoring cache lag
    pub fn applied_lobby(&self) -> Option<Lobby> {
        self.lock().ok().and_then(|s| {
            s.lobby
                .clone()
                .or_else(|| s.pending.as_ref().map(|p| p.lobby.clone()))
        })
    }

    pub fn invited(&self) -> Vec<SteamId> {
        self.lock().map(|s| s.invited.clone()).unwrap_or_default()
    }

    pub fn hellos(&self) -> u64 {
        self.lock().map(|s| s.hellos).unwrap_or(0)
    }

    pub fn is_playing(&self) -> bool {
        self.lock().map(|s| s.playing).unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, CoordinatorState>> {
        self.state.lock().map_err(|_| {
            WardenError::InternalError {
                message: "Failed to acquire coordinator state lock".to_string(),
            }
            .into()
        })
    }

    fn rejected(command: &str, message: impl Into<String>) -> anyhow::Error {
        WardenError::CommandFailed {
            command: command.to_string(),
            message: message.into(),
        }
        .into()
    }
}

impl CoordinatorState {
    /// Make a pending lobby visible regardless of remaining lag
    fn apply_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.lobby = Some(pending.lobby);
        }
    }
}

#[async_trait]
impl SessionCommands for SimulatedCoordinator {
    async fn destroy_lobby(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.commands.push("destroy");
        state.apply_pending();

        match state.lobby.as_ref().map(|l| l.state) {
            None => Err(Self::rejected("destroy_lobby", "no lobby to destroy")),
            Some(LobbyState::Ui) => {
                state.lobby = None;
                Ok(())
            }
            Some(other) => Err(Self::rejected(
                "destroy_lobby",
                format!("cannot destroy lobby in state {}", other),
            )),
        }
    }

    async fn leave_lobby(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.commands.push("leave");
        state.apply_pending();

        if let Some(lobby) = &state.lobby {
            if !lobby.state.is_setup() && lobby.state != LobbyState::PostGame {
                return Err(Self::rejected(
                    "leave_lobby",
                    format!("must abandon lobby in state {} first", lobby.state),
                ));
            }
        }
        state.lobby = None;
        Ok(())
    }

    async fn abandon_lobby(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.commands.push("abandon");
        state.apply_pending();

        if let Some(lobby) = state.lobby.as_mut() {
            if !lobby.state.is_setup() {
                lobby.state = LobbyState::PostGame;
            }
        }
        Ok(())
    }

    async fn create_lobby(&self, config: &LobbyConfig) -> Result<()> {
        let mut state = self.lock()?;
        state.commands.push("create");

        if self.settings.reject_create {
            return Err(Self::rejected("create_lobby", "coordinator unavailable"));
        }
        if state.lobby.is_some() || state.pending.is_some() {
            return Err(Self::rejected("create_lobby", "already in a lobby"));
        }

        let lobby_id = state.next_lobby_id;
        state.next_lobby_id += 1;
        debug!(lobby_id, "Simulated lobby accepted");

        state.pending = Some(PendingLobby {
            lobby: Lobby {
                lobby_id,
                state: LobbyState::Ui,
                game_name: config.game_name.clone(),
                pass_key: config.pass_key.clone(),
                members: vec![LobbyMember {
                    account_id: self.settings.own_account,
                    team: TeamSlot::Radiant,
                }],
            },
            misses_left: self.settings.convergence_lag,
        });

        if self.settings.lose_create_ack {
            return Err(Self::rejected("create_lobby", "timeout waiting for ack"));
        }
        Ok(())
    }

    async fn kick_member(&self, account_id: AccountId) -> Result<()> {
        let mut state = self.lock()?;
        state.commands.push("kick");
        state.apply_pending();

        let member = state
            .lobby
            .as_mut()
            .and_then(|l| l.members.iter_mut().find(|m| m.account_id == account_id))
            .ok_or_else(|| Self::rejected("kick_member", "member not in lobby"))?;
        member.team = TeamSlot::Unassigned;
        Ok(())
    }

    async fn invite_member(&self, member_id: SteamId) -> Result<()> {
        let mut state = self.lock()?;
        state.commands.push("invite");
        state.apply_pending();

        if state.lobby.is_none() {
            return Err(Self::rejected("invite_member", "no lobby"));
        }
        state.invited.push(member_id);
        Ok(())
    }

    async fn launch_lobby(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.commands.push("launch");
        state.apply_pending();

        let lobby = state
            .lobby
            .as_mut()
            .ok_or_else(|| Self::rejected("launch_lobby", "no lobby"))?;
        lobby.state = LobbyState::Run;
        Ok(())
    }
}

#[async_trait]
impl CacheQuery for SimulatedCoordinator {
    async fn current_lobby(&self) -> Result<Option<Lobby>> {
        let mut state = self.lock()?;

        if state.failing_lookups_left > 0 {
            state.failing_lookups_left -= 1;
            return Err(WardenError::LookupFailed {
                message: "lobby cache container not ready".to_string(),
            }
            .into());
        }

        if let Some(pending) = state.pending.as_mut() {
            if pending.misses_left > 0 {
                pending.misses_left -= 1;
                return Ok(None);
            }
            state.apply_pending();
        }

        Ok(state.lobby.clone())
    }
}

#[async_trait]
impl PresenceSignal for SimulatedCoordinator {
    async fn set_playing(&self, playing: bool) -> Result<()> {
        self.lock()?.playing = playing;
        Ok(())
    }

    async fn say_hello(&self) -> Result<()> {
        self.lock()?.hellos += 1;
        Ok(())
    }
}
