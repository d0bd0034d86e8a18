//! External service collaborators
//!
//! The recording controller depends on three trait seams — transcription,
//! dialogue generation, and speech synthesis — so tests can substitute
//! deterministic fakes for the HTTP-backed implementations here.

mod dialogue;
mod stt;
mod tts;

pub use dialogue::ChatDialogue;
pub use stt::SpeechToText;
pub use tts::SpeechSynthesis;

use async_trait::async_trait;

use crate::Result;

/// One captured utterance submitted for transcription
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// WAV-encoded audio
    pub audio_wav: Vec<u8>,

    /// Locale of the expected speech (BCP 47, e.g. "sv-SE")
    pub locale: String,

    /// Optional recognition hint (topic phrase, vocabulary nudge)
    pub prompt_hint: Option<String>,
}

/// Converts captured speech to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one utterance
    ///
    /// # Errors
    ///
    /// Returns error if the service fails; an empty transcript is returned
    /// as-is and handled by the caller
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String>;
}

/// One user turn submitted to the dialogue generator
#[derive(Debug, Clone)]
pub struct DialogueRequest {
    /// The transcribed user utterance
    pub text: String,

    /// Conversation topic identifier
    pub topic: String,
}

/// A two-part assistant reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueReply {
    /// Reply in the practice language
    pub reply: String,

    /// Translation of the reply
    pub translation: String,
}

/// Generates conversational replies
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    /// Produce the assistant's next turn
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedReply`] when the two-part reply
    /// shape is missing, or [`crate::Error::Dialogue`] on service failure
    async fn respond(&self, request: &DialogueRequest) -> Result<DialogueReply>;
}

/// Text submitted for speech synthesis
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,

    /// Locale of the text
    pub locale: String,

    /// Voice selection
    pub voice: String,
}

/// Synthesizes speech audio from text
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize audio (MP3 bytes) for the given text
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}
