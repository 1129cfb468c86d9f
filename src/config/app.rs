//! Main application configuration
//!
//! This module defines the configuration structures for the lobby warden,
//! including environment variable and TOML file loading and validation.

use crate::error::WardenError;
use crate::lobby::config::LobbyConfig;
use crate::lobby::invite::InviteSettings;
use crate::lobby::reconciler::ReconcileSettings;
use crate::session::SimulationSettings;
use crate::types::{BotDifficulty, GameMode, SteamId};
use crate::utils::parse_list;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub reconcile: ReconcileTimings,
    pub lobby: LobbyConfig,
    pub invite: InviteTimings,
    pub presence: PresenceSettings,
    pub simulation: SimulationSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log the Prometheus text exposition on shutdown
    pub dump_metrics: bool,
}

/// Reconciliation pauses and poll budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileTimings {
    /// Pause before the first lobby lookup
    pub warmup_delay_ms: u64,
    /// Pause between teardown and create
    pub settle_delay_ms: u64,
    /// Maximum cache polls after create
    pub poll_attempts: u32,
    /// Pause before each poll
    pub poll_interval_ms: u64,
}

/// Invite follow-up settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteTimings {
    /// Members to invite after the lobby exists
    pub members: Vec<SteamId>,
    /// Free the local user's team slot first
    pub kick_self: bool,
    /// Pause between reconciliation and the first invite
    pub post_create_delay_ms: u64,
    /// Pause between the last invite and the launch
    pub launch_delay_ms: u64,
    /// Launch the lobby at the end
    pub launch: bool,
}

/// Presence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    /// Pause between announcing playing state and the first hello
    pub startup_delay_ms: u64,
    /// Interval between heartbeat hellos
    pub heartbeat_interval_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "lobby-warden".to_string(),
            log_level: "info".to_string(),
            dump_metrics: false,
        }
    }
}

impl Default for ReconcileTimings {
    fn default() -> Self {
        Self {
            warmup_delay_ms: 3000,
            settle_delay_ms: 3000,
            poll_attempts: 5,
            poll_interval_ms: 2000,
        }
    }
}

impl Default for InviteTimings {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            kick_self: true,
            post_create_delay_ms: 1000,
            launch_delay_ms: 10_000,
            launch: true,
        }
    }
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            startup_delay_ms: 1000,
            heartbeat_interval_ms: 2000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from a TOML file; missing keys take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Some(dump) = parse_var(&lookup, "DUMP_METRICS")? {
            config.service.dump_metrics = dump;
        }

        // Reconcile settings
        if let Some(delay) = parse_var(&lookup, "RECONCILE_WARMUP_DELAY_MS")? {
            config.reconcile.warmup_delay_ms = delay;
        }
        if let Some(delay) = parse_var(&lookup, "RECONCILE_SETTLE_DELAY_MS")? {
            config.reconcile.settle_delay_ms = delay;
        }
        if let Some(attempts) = parse_var(&lookup, "RECONCILE_POLL_ATTEMPTS")? {
            config.reconcile.poll_attempts = attempts;
        }
        if let Some(interval) = parse_var(&lookup, "RECONCILE_POLL_INTERVAL_MS")? {
            config.reconcile.poll_interval_ms = interval;
        }

        // Lobby settings
        if let Some(name) = lookup("LOBBY_NAME") {
            config.lobby.game_name = name;
        }
        if let Some(pass_key) = lookup("LOBBY_PASS_KEY") {
            config.lobby.pass_key = pass_key;
        }
        if let Some(mode) = parse_var::<u32, _>(&lookup, "LOBBY_GAME_MODE")? {
            config.lobby.game_mode = GameMode(mode);
        }
        if let Some(raw) = lookup("LOBBY_CUSTOM_GAME_ID") {
            config.lobby.custom_game_id = parse_optional(&raw, "LOBBY_CUSTOM_GAME_ID")?;
        }
        if let Some(visibility) = parse_var(&lookup, "LOBBY_VISIBILITY")? {
            config.lobby.visibility = visibility;
        }
        if let Some(allow) = parse_var(&lookup, "LOBBY_ALLOW_CHEATS")? {
            config.lobby.allow_cheats = allow;
        }
        if let Some(fill) = parse_var(&lookup, "LOBBY_FILL_WITH_BOTS")? {
            config.lobby.fill_with_bots = fill;
        }
        if let Some(allow) = parse_var(&lookup, "LOBBY_ALLOW_SPECTATING")? {
            config.lobby.allow_spectating = allow;
        }
        if let Some(difficulty) = parse_var::<BotDifficulty, _>(&lookup, "LOBBY_BOT_DIFFICULTY")? {
            config.lobby = config.lobby.with_bot_difficulty(difficulty);
        }

        // Invite settings
        if let Some(members) = lookup("INVITE_MEMBERS") {
            config.invite.members = parse_list(&members)
                .map_err(|_| anyhow!("Invalid INVITE_MEMBERS value: {}", members))?;
        }
        if let Some(kick_self) = parse_var(&lookup, "INVITE_KICK_SELF")? {
            config.invite.kick_self = kick_self;
        }
        if let Some(launch) = parse_var(&lookup, "INVITE_LAUNCH")? {
            config.invite.launch = launch;
        }
        if let Some(delay) = parse_var(&lookup, "LAUNCH_DELAY_MS")? {
            config.invite.launch_delay_ms = delay;
        }

        // Presence settings
        if let Some(interval) = parse_var(&lookup, "HEARTBEAT_INTERVAL_MS")? {
            config.presence.heartbeat_interval_ms = interval;
        }

        // Simulation settings
        if let Some(lag) = parse_var(&lookup, "SIMULATION_CONVERGENCE_LAG")? {
            config.simulation.convergence_lag = lag;
        }
        if let Some(failing) = parse_var(&lookup, "SIMULATION_FAILING_LOOKUPS")? {
            config.simulation.failing_lookups = failing;
        }
        if let Some(raw) = lookup("SIMULATION_STALE_LOBBY_STATE") {
            config.simulation.stale_lobby_state =
                parse_optional(&raw, "SIMULATION_STALE_LOBBY_STATE")?;
        }
        if let Some(reject) = parse_var(&lookup, "SIMULATION_REJECT_CREATE")? {
            config.simulation.reject_create = reject;
        }
        if let Some(lose) = parse_var(&lookup, "SIMULATION_LOSE_CREATE_ACK")? {
            config.simulation.lose_create_ack = lose;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Reconciler settings built from the configured timings
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            warmup_delay: Duration::from_millis(self.reconcile.warmup_delay_ms),
            settle_delay: Duration::from_millis(self.reconcile.settle_delay_ms),
            poll_attempts: self.reconcile.poll_attempts,
            poll_interval: Duration::from_millis(self.reconcile.poll_interval_ms),
        }
    }

    /// Invite follow-up settings built from the configured timings
    pub fn invite_settings(&self) -> InviteSettings {
        InviteSettings {
            kick_self: self.invite.kick_self,
            invitees: self.invite.members.clone(),
            launch_delay: Duration::from_millis(self.invite.launch_delay_ms),
            launch: self.invite.launch,
        }
    }

    /// Get the pause between reconciliation and the invite follow-up
    pub fn post_create_delay(&self) -> Duration {
        Duration::from_millis(self.invite.post_create_delay_ms)
    }

    /// Get the pause before the first hello
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.presence.startup_delay_ms)
    }

    /// Get the heartbeat interval
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.presence.heartbeat_interval_ms)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw)),
        None => Ok(None),
    }
}

/// Parse a value where an empty string or `none` means "unset"
fn parse_optional<T: FromStr>(raw: &str, key: &str) -> Result<Option<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| anyhow!("Invalid {} value: {}", key, raw))
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    WardenError::ConfigurationError {
        message: message.into(),
    }
    .into()
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => {
            return Err(invalid(format!(
                "Invalid log level: {}",
                config.service.log_level
            )))
        }
    }

    // Validate reconcile budget
    if config.reconcile.poll_attempts == 0 {
        return Err(invalid("Poll attempts must be greater than 0"));
    }
    if config.reconcile.poll_interval_ms == 0 {
        return Err(invalid("Poll interval must be greater than 0"));
    }

    // Validate presence
    if config.presence.heartbeat_interval_ms == 0 {
        return Err(invalid("Heartbeat interval must be greater than 0"));
    }

    config.lobby.validate()?;

    Ok(())
}
