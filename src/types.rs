//! Common types used throughout the lobby warden

use crate::error::WardenError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 32-bit account identifier used for team-slot operations
pub type AccountId = u32;

/// Server-assigned lobby identifier
pub type LobbyId = u64;

/// Stable 64-bit member identifier used for invitations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SteamId(pub u64);

impl SteamId {
    /// Account id carried in the low 32 bits
    pub fn account_id(self) -> AccountId {
        (self.0 & 0xFFFF_FFFF) as AccountId
    }
}

impl From<u64> for SteamId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for SteamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SteamId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(SteamId)
    }
}

/// Lifecycle state of a server-side lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LobbyState {
    /// Setup screen; the only state that can be left without abandoning
    Ui,
    ReadyUp,
    ServerSetup,
    /// Match in progress
    Run,
    PostGame,
    NotReady,
    ServerAssign,
}

impl LobbyState {
    /// Whether the lobby is still in its initial setup state
    pub fn is_setup(self) -> bool {
        self == LobbyState::Ui
    }
}

impl std::fmt::Display for LobbyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LobbyState::Ui => "UI",
            LobbyState::ReadyUp => "READYUP",
            LobbyState::ServerSetup => "SERVERSETUP",
            LobbyState::Run => "RUN",
            LobbyState::PostGame => "POSTGAME",
            LobbyState::NotReady => "NOTREADY",
            LobbyState::ServerAssign => "SERVERASSIGN",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LobbyState {
    type Err = WardenError;

    /// Accepts the display name in any case, with or without underscores
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match name.as_str() {
            "UI" => Ok(LobbyState::Ui),
            "READYUP" => Ok(LobbyState::ReadyUp),
            "SERVERSETUP" => Ok(LobbyState::ServerSetup),
            "RUN" => Ok(LobbyState::Run),
            "POSTGAME" => Ok(LobbyState::PostGame),
            "NOTREADY" => Ok(LobbyState::NotReady),
            "SERVERASSIGN" => Ok(LobbyState::ServerAssign),
            _ => Err(unknown_variant("lobby state", s)),
        }
    }
}

/// Team slot a lobby member occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamSlot {
    Radiant,
    Dire,
    /// Unassigned pool; where a kicked-from-team member ends up
    Unassigned,
    Spectator,
}

/// A member as seen in the lobby cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyMember {
    pub account_id: AccountId,
    pub team: TeamSlot,
}

/// Snapshot of the current lobby as mirrored by the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    pub lobby_id: LobbyId,
    pub state: LobbyState,
    pub game_name: String,
    pub pass_key: String,
    pub members: Vec<LobbyMember>,
}

impl Lobby {
    /// Find a member by account id
    pub fn member(&self, account_id: AccountId) -> Option<&LobbyMember> {
        self.members.iter().find(|m| m.account_id == account_id)
    }
}

/// Game mode requested for the lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameMode(pub u32);

impl GameMode {
    pub const ALL_PICK: GameMode = GameMode(1);
    pub const CUSTOM: GameMode = GameMode(15);
}

/// Who can see the lobby in the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyVisibility {
    Public,
    Friends,
    Unlisted,
}

/// Difficulty of bots filling a side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotDifficulty {
    Passive,
    Easy,
    Medium,
    Hard,
    Unfair,
}

impl FromStr for LobbyVisibility {
    type Err = WardenError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(LobbyVisibility::Public),
            "friends" => Ok(LobbyVisibility::Friends),
            "unlisted" => Ok(LobbyVisibility::Unlisted),
            _ => Err(unknown_variant("lobby visibility", s)),
        }
    }
}

impl FromStr for BotDifficulty {
    type Err = WardenError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passive" => Ok(BotDifficulty::Passive),
            "easy" => Ok(BotDifficulty::Easy),
            "medium" => Ok(BotDifficulty::Medium),
            "hard" => Ok(BotDifficulty::Hard),
            "unfair" => Ok(BotDifficulty::Unfair),
            _ => Err(unknown_variant("bot difficulty", s)),
        }
    }
}

fn unknown_variant(kind: &str, raw: &str) -> WardenError {
    WardenError::ConfigurationError {
        message: format!("Unknown {}: {}", kind, raw),
    }
}
