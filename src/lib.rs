//! Lobby Warden - lobby reconciliation for game-coordinator sessions
//!
//! This crate tears down stale lobbies, creates exactly one fresh lobby,
//! waits for the coordinator's cache to reflect it, and then handles member
//! invitations and launch. The coordinator session itself is an external
//! collaborator reached through the traits in [`session`].

pub mod config;
pub mod error;
pub mod lobby;
pub mod metrics;
pub mod presence;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ReconcileError, Result, WardenError};
pub use types::*;

// Re-export key components
pub use lobby::{LobbyConfig, LobbyReconciler, MemberInviter, ReconcileOutcome};
pub use session::{CacheQuery, PresenceSignal, SessionCommands};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
