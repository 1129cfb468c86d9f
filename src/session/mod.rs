//! Collaborator interfaces for the game-coordinator session
//!
//! The warden never talks to the network itself. Everything it does to the
//! server goes through [`SessionCommands`], everything it knows about the
//! server comes from [`CacheQuery`]. Command success only means the request
//! was accepted; whether it was applied is observed through the cache.

pub mod simulated;

use crate::error::Result;
use crate::lobby::config::LobbyConfig;
use crate::types::{AccountId, Lobby, SteamId};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

pub use simulated::{SimulatedCoordinator, SimulationSettings};

/// Fire-and-forget lobby commands sent to the coordinator
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionCommands: Send + Sync {
    /// Destroy the lobby the session currently owns
    async fn destroy_lobby(&self) -> Result<()>;

    /// Leave the current lobby
    async fn leave_lobby(&self) -> Result<()>;

    /// Abandon the match associated with the current lobby
    async fn abandon_lobby(&self) -> Result<()>;

    /// Request creation of a lobby with the given details
    async fn create_lobby(&self, config: &LobbyConfig) -> Result<()>;

    /// Move a member out of their team slot
    async fn kick_member(&self, account_id: AccountId) -> Result<()>;

    /// Invite a member to the current lobby
    async fn invite_member(&self, member_id: SteamId) -> Result<()>;

    /// Start the game for the current lobby
    async fn launch_lobby(&self) -> Result<()>;
}

/// Read-only, eventually consistent view of server-side lobby state
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheQuery: Send + Sync {
    /// The lobby the cache currently mirrors, if any
    async fn current_lobby(&self) -> Result<Option<Lobby>>;
}

/// Presence signalling used by the heartbeat task
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PresenceSignal: Send + Sync {
    /// Announce whether the client is in-game
    async fn set_playing(&self, playing: bool) -> Result<()>;

    /// Keep-alive hello to the coordinator
    async fn say_hello(&self) -> Result<()>;
}
