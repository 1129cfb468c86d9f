//! Test fixtures for integration testing
//!
//! The recording collaborators write every command, cache lookup and pause
//! into one shared timeline so tests can assert on exact ordering.

#![allow(dead_code)]

use async_trait::async_trait;
use lobby_warden::error::Result;
use lobby_warden::lobby::clock::Sleeper;
use lobby_warden::lobby::config::LobbyConfig;
use lobby_warden::session::{
    CacheQuery, SessionCommands, SimulatedCoordinator, SimulationSettings,
};
use lobby_warden::types::{AccountId, Lobby, SteamId};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, ordered record of everything the collaborators saw
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Arc<Mutex<Vec<String>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.into());
        }
    }

    /// All events recorded so far
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events up to (not including) the first occurrence of `marker`
    pub fn before(&self, marker: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .take_while(|e| e != marker)
            .collect()
    }

    /// Events after the first occurrence of `marker`
    pub fn after(&self, marker: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .skip_while(|e| e != marker)
            .skip(1)
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

/// Sleeper that records the requested pause and returns immediately
pub struct RecordingSleeper {
    timeline: Timeline,
}

impl RecordingSleeper {
    pub fn new(timeline: Timeline) -> Self {
        Self { timeline }
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.timeline
            .push(format!("sleep {}ms", duration.as_millis()));
    }
}

/// Wraps a simulated coordinator and records every call made through it
///
/// Failed commands are recorded with a `!` suffix, e.g. `destroy!`. Lookups
/// are recorded as `lookup:hit`, `lookup:miss` or `lookup:error`.
pub struct RecordingSession {
    inner: Arc<SimulatedCoordinator>,
    timeline: Timeline,
}

impl RecordingSession {
    pub fn new(settings: SimulationSettings, timeline: Timeline) -> Self {
        Self {
            inner: Arc::new(SimulatedCoordinator::new(settings)),
            timeline,
        }
    }

    pub fn coordinator(&self) -> Arc<SimulatedCoordinator> {
        self.inner.clone()
    }

    fn record(&self, name: &str, result: Result<()>) -> Result<()> {
        match &result {
            Ok(()) => self.timeline.push(name),
            Err(_) => self.timeline.push(format!("{}!", name)),
        }
        result
    }
}

#[async_trait]
impl SessionCommands for RecordingSession {
    async fn destroy_lobby(&self) -> Result<()> {
        let result = self.inner.destroy_lobby().await;
        self.record("destroy", result)
    }

    async fn leave_lobby(&self) -> Result<()> {
        let result = self.inner.leave_lobby().await;
        self.record("leave", result)
    }

    async fn abandon_lobby(&self) -> Result<()> {
        let result = self.inner.abandon_lobby().await;
        self.record("abandon", result)
    }

    async fn create_lobby(&self, config: &LobbyConfig) -> Result<()> {
        let result = self.inner.create_lobby(config).await;
        self.record("create", result)
    }

    async fn kick_member(&self, account_id: AccountId) -> Result<()> {
        let result = self.inner.kick_member(account_id).await;
        self.record("kick", result)
    }

    async fn invite_member(&self, member_id: SteamId) -> Result<()> {
        let result = self.inner.invite_member(member_id).await;
        self.record("invite", result)
    }

    async fn launch_lobby(&self) -> Result<()> {
        let result = self.inner.launch_lobby().await;
        self.record("launch", result)
    }
}

#[async_trait]
impl CacheQuery for RecordingSession {
    async fn current_lobby(&self) -> Result<Option<Lobby>> {
        let result = self.inner.current_lobby().await;
        match &result {
            Ok(Some(_)) => self.timeline.push("lookup:hit"),
            Ok(None) => self.timeline.push("lookup:miss"),
            Err(_) => self.timeline.push("lookup:error"),
        }
        result
    }
}

/// Convert a list of literals into owned event strings
pub fn events(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
