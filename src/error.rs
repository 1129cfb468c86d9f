//! Error types for the lobby warden
//!
//! Collaborator and service plumbing uses anyhow for consistent propagation;
//! the typed enums below let callers match on the failures they care about.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for configuration and collaborator failures
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("Session command failed: {command}: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Lobby cache lookup failed: {message}")]
    LookupFailed { message: String },

    #[error("Invalid lobby configuration: {reason}")]
    InvalidLobbyConfig { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

/// Terminal failure of a lobby reconciliation
///
/// Lookup, teardown and create errors never appear here; they are absorbed
/// and recorded on the outcome instead. Whether the lobby exists is decided
/// by the cache alone.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Lobby creation did not converge after {attempts} poll attempts")]
    NotConverged { attempts: u32 },
}
