//! Service layer for the lobby warden
//!
//! This module wires the collaborators, reconciler, invite follow-up and
//! heartbeat into one runnable session.

pub mod app;

pub use app::{LobbyOrchestrator, ServiceError, SessionHandles, SessionReport};
