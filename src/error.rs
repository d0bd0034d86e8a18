//! Error types for samtal

use thiserror::Error;

/// Result type alias for samtal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the conversation loop
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Microphone/stream setup failed
    #[error("acquisition error: {0}")]
    Acquisition(String),

    /// Transcription service failure
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Transcription produced no usable speech
    #[error("no speech detected")]
    NoSpeechDetected,

    /// Dialogue service failure
    #[error("dialogue error: {0}")]
    Dialogue(String),

    /// Dialogue reply missing the expected two-part shape
    #[error("malformed dialogue reply: {0}")]
    MalformedReply(String),

    /// Speech synthesis or playback failure
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// A guarded call exceeded its deadline
    #[error("{0} call exceeded its deadline")]
    Timeout(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// True when the failure came from the deadline guard rather than the
    /// operation itself
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
