//! # Playback Error Types
//!
//! Error taxonomy of the media session bridge. None of these are fatal: the
//! bridge logs them and degrades to "nothing happens".

use thiserror::Error;

use crate::protocol::SessionId;

/// Errors that can occur while handling bridge traffic.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// Command record is missing a field, carries a mistyped field, or names
    /// an unknown action.
    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    /// Command addressed a session that does not exist.
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// The bridge queue has shut down.
    #[error("Bridge queue closed")]
    QueueClosed,

    // ========================================================================
    // Async Completion Errors
    // ========================================================================
    /// Native source failed to become ready.
    #[error("Failed to load source {url}: {reason}")]
    LoadFailed { url: String, reason: String },

    /// Completion arrived for a superseded load or metadata generation.
    #[error("Stale completion for session {0}")]
    StaleCallback(SessionId),

    // ========================================================================
    // Control Surface Errors
    // ========================================================================
    /// Transport command could not be applied.
    #[error("Surface command rejected: {0}")]
    SurfaceCommandFailed(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Host adapter error.
    #[error("Adapter error: {0}")]
    Adapter(#[from] bridge_traits::BridgeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if the error comes from the script side of the channel.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::MalformedCommand(_) | PlaybackError::UnknownSession(_)
        )
    }

    /// Returns `true` if the error is an expected race that is silently
    /// discarded.
    pub fn is_stale(&self) -> bool {
        matches!(self, PlaybackError::StaleCallback(_))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
