//! Desired lobby configuration
//!
//! A [`LobbyConfig`] is the full set of details carried by a create-lobby
//! request. It is built once per reconciliation and never mutated by the
//! reconciler.

use crate::error::{Result, WardenError};
use crate::types::{BotDifficulty, GameMode, LobbyVisibility};
use serde::{Deserialize, Serialize};

/// Maximum accepted pass key length
pub const MAX_PASS_KEY_LEN: usize = 64;

/// Bot id used for both sides when none is configured
pub const DEFAULT_BOT_SCRIPT_ID: u64 = 18446744072660900618;

/// Per-side bot settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSide {
    /// Workshop id of the bot script for this side
    pub bot_id: u64,
    pub difficulty: BotDifficulty,
}

impl Default for BotSide {
    fn default() -> Self {
        Self {
            bot_id: DEFAULT_BOT_SCRIPT_ID,
            difficulty: BotDifficulty::Unfair,
        }
    }
}

/// Details of the lobby to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Name shown in the lobby browser
    pub game_name: String,
    /// Password required to join
    pub pass_key: String,
    pub game_mode: GameMode,
    /// Custom game identifier, if the lobby runs a custom game
    pub custom_game_id: Option<u64>,
    pub allow_cheats: bool,
    /// Fill empty slots with bots on launch
    pub fill_with_bots: bool,
    pub allow_spectating: bool,
    pub visibility: LobbyVisibility,
    pub bots_radiant: BotSide,
    pub bots_dire: BotSide,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            game_name: "lobbytest".to_string(),
            pass_key: "123".to_string(),
            game_mode: GameMode::ALL_PICK,
            custom_game_id: Some(DEFAULT_BOT_SCRIPT_ID),
            allow_cheats: true,
            fill_with_bots: true,
            allow_spectating: true,
            visibility: LobbyVisibility::Public,
            bots_radiant: BotSide::default(),
            bots_dire: BotSide::default(),
        }
    }
}

impl LobbyConfig {
    /// Create a configuration with the given name and defaults for the rest
    pub fn named(game_name: impl Into<String>) -> Self {
        Self {
            game_name: game_name.into(),
            ..Self::default()
        }
    }

    pub fn with_pass_key(mut self, pass_key: impl Into<String>) -> Self {
        self.pass_key = pass_key.into();
        self
    }

    pub fn with_game_mode(mut self, game_mode: GameMode) -> Self {
        self.game_mode = game_mode;
        self
    }

    pub fn with_visibility(mut self, visibility: LobbyVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the same bot difficulty on both sides
    pub fn with_bot_difficulty(mut self, difficulty: BotDifficulty) -> Self {
        self.bots_radiant.difficulty = difficulty;
        self.bots_dire.difficulty = difficulty;
        self
    }

    /// Check the configuration can be sent as a create request
    pub fn validate(&self) -> Result<()> {
        if self.game_name.trim().is_empty() {
            return Err(WardenError::InvalidLobbyConfig {
                reason: "Lobby name cannot be empty".to_string(),
            }
            .into());
        }

        if self.pass_key.chars().count() > MAX_PASS_KEY_LEN {
            return Err(WardenError::InvalidLobbyConfig {
                reason: format!("Pass key cannot exceed {} characters", MAX_PASS_KEY_LEN),
            }
            .into());
        }

        Ok(())
    }
}
