//! Lobby reconciliation and follow-up for the lobby warden
//!
//! This module tears down stale lobbies, creates the requested lobby and
//! handles the invite/launch sequence that follows it.

pub mod clock;
pub mod config;
pub mod invite;
pub mod reconciler;

// Re-export commonly used types
pub use clock::{InstantSleeper, Sleeper, TokioSleeper};
pub use config::{BotSide, LobbyConfig};
pub use invite::{InviteReport, InviteSettings, MemberInviter};
pub use reconciler::{LobbyReconciler, ReconcileOutcome, ReconcileSettings, TeardownStep};
