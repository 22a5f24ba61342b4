//! Error types for playback management

use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The store has no playable stream for a song
    #[error("no playable stream for \"{title}\"")]
    SongUnavailable {
        /// Title of the song that could not be resolved
        title: String,
    },

    /// The audio device rejected a command
    #[error("audio device error: {0}")]
    Device(String),

    /// The song gateway failed
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Settings file could not be parsed
    #[error("malformed settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
