//! samtal — voice conversation practice loop
//!
//! Captures microphone audio, detects end-of-utterance by sustained
//! silence, transcribes the utterance, asks a dialogue model for a reply in
//! the practice language (with a translation), synthesizes the reply, plays
//! it back, and optionally re-arms capture automatically.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Microphone                      │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//! ┌──────────────────────────▼───────────────────────────┐
//! │  AudioLevelMonitor ─► SilenceDetector ─► Controller  │
//! │  RecordingController  │  AutoRecordScheduler         │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ guarded calls
//! ┌──────────────────────────▼───────────────────────────┐
//! │   STT (Whisper/Deepgram) │ Dialogue │ TTS + cache    │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod cache;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod message;
pub mod scheduler;
pub mod services;
pub mod timeout;

pub use cache::SpeechCache;
pub use config::Config;
pub use controller::{
    ControllerConfig, Phase, ProcessingFlags, RecordingController, SessionEvent,
};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use message::{ConversationMessage, Role};
pub use scheduler::{AutoRecordScheduler, SchedulerConfig};
