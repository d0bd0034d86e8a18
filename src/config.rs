//! Configuration management for samtal
//!
//! Defaults, then an optional TOML file, then environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::Result;

/// samtal configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Voice pipeline configuration (locale, models, voice)
    pub voice: VoiceConfig,

    /// Silence detection configuration
    pub silence: SilenceSettings,

    /// Auto-record scheduling configuration
    pub auto_record: AutoRecordSettings,

    /// Synthesized-audio cache configuration
    pub cache: CacheSettings,

    /// External service call configuration
    pub services: ServiceSettings,

    /// Conversation message texts
    pub messages: MessageSettings,

    /// API keys (environment only, never from file)
    #[serde(skip)]
    pub api_keys: ApiKeys,
}

/// Voice pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Practice-language locale (BCP 47, e.g. "sv-SE")
    pub locale: String,

    /// TTS voice identifier
    pub voice: String,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1", "eleven_multilingual_v2")
    pub tts_model: String,

    /// Chat model for dialogue generation
    pub chat_model: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// Conversation topic identifier handed to the dialogue service
    pub topic: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            locale: "sv-SE".to_string(),
            voice: "alloy".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            tts_speed: 1.0,
            topic: "vardagsliv".to_string(),
        }
    }
}

/// Silence detection configuration
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SilenceSettings {
    /// Normalized loudness threshold in [0, 1] below which a sample counts
    /// as silent
    pub threshold: f32,

    /// Silence must hold this long before an utterance is considered done
    pub sustained_ms: u64,

    /// Level sampling cadence (~60 Hz by default)
    pub cadence_ms: u64,
}

impl Default for SilenceSettings {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            sustained_ms: 1000,
            cadence_ms: 16,
        }
    }
}

impl SilenceSettings {
    /// Sustained silence duration
    #[must_use]
    pub const fn sustained(&self) -> Duration {
        Duration::from_millis(self.sustained_ms)
    }

    /// Level sampling cadence
    #[must_use]
    pub const fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }
}

/// Auto-record scheduling configuration
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AutoRecordSettings {
    /// Start with auto-record enabled
    pub enabled: bool,

    /// Delay before re-arming capture after a finished turn
    pub rearm_delay_ms: u64,

    /// Delay before the first capture when auto-record is switched on
    pub enable_delay_ms: u64,
}

impl Default for AutoRecordSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            rearm_delay_ms: 1000,
            enable_delay_ms: 500,
        }
    }
}

impl AutoRecordSettings {
    /// Re-arm delay after returning to idle
    #[must_use]
    pub const fn rearm_delay(&self) -> Duration {
        Duration::from_millis(self.rearm_delay_ms)
    }

    /// Arm delay after enabling auto-record
    #[must_use]
    pub const fn enable_delay(&self) -> Duration {
        Duration::from_millis(self.enable_delay_ms)
    }
}

/// Synthesized-audio cache configuration
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Entry time-to-live in seconds
    pub ttl_secs: u64,

    /// Maximum number of live entries
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            capacity: 100,
        }
    }
}

impl CacheSettings {
    /// Entry time-to-live
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// External service call configuration
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Deadline for each guarded external call
    pub deadline_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { deadline_ms: 10_000 }
    }
}

impl ServiceSettings {
    /// Guarded call deadline
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Conversation message texts shown while processing or after failures
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessageSettings {
    /// Placeholder content shown while an utterance is transcribed
    pub placeholder: String,

    /// Apology in the practice language appended when a turn fails
    pub apology: String,

    /// Translation of the apology
    pub apology_translation: String,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            placeholder: "\u{2026}".to_string(),
            apology: "F\u{f6}rl\u{e5}t, n\u{e5}got gick fel. Kan du s\u{e4}ga det igen?".to_string(),
            apology_translation: "Sorry, something went wrong. Could you say that again?"
                .to_string(),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, chat completions, TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl Config {
    /// Load configuration from the default locations
    ///
    /// # Errors
    ///
    /// Returns error if an existing config file cannot be read; a file that
    /// fails to parse is logged and ignored
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                match toml::from_str::<Self>(&content) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "loaded config file");
                        config
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to parse config file, using defaults"
                        );
                        Self::default()
                    }
                }
            }
            _ => Self::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Resolve the config file path: `SAMTAL_CONFIG` override, then the XDG
    /// config directory
    fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SAMTAL_CONFIG") {
            return Some(PathBuf::from(path));
        }

        directories::ProjectDirs::from("se", "samtal", "samtal")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply environment overrides on top of file/default values
    fn apply_env(&mut self) {
        if let Ok(locale) = std::env::var("SAMTAL_LOCALE") {
            self.voice.locale = locale;
        }
        if let Ok(voice) = std::env::var("SAMTAL_VOICE") {
            self.voice.voice = voice;
        }
        if let Ok(topic) = std::env::var("SAMTAL_TOPIC") {
            self.voice.topic = topic;
        }
        if let Ok(model) = std::env::var("SAMTAL_STT_MODEL") {
            self.voice.stt_model = model;
        }
        if let Ok(model) = std::env::var("SAMTAL_TTS_MODEL") {
            self.voice.tts_model = model;
        }
        if let Ok(model) = std::env::var("SAMTAL_CHAT_MODEL") {
            self.voice.chat_model = model;
        }

        self.api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok(),
            deepgram: std::env::var("DEEPGRAM_API_KEY").ok(),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY").ok(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert!((config.silence.threshold - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.silence.sustained(), Duration::from_millis(1000));
        assert_eq!(config.auto_record.rearm_delay(), Duration::from_millis(1000));
        assert_eq!(config.auto_record.enable_delay(), Duration::from_millis(500));
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache.capacity, 100);
        assert_eq!(config.services.deadline(), Duration::from_millis(10_000));
    }

    #[test]
    fn partial_toml_keeps_defaults_elsewhere() {
        let config: Config = toml::from_str(
            r#"
            [silence]
            threshold = 0.2

            [voice]
            locale = "da-DK"
            "#,
        )
        .unwrap();

        assert!((config.silence.threshold - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.silence.sustained_ms, 1000);
        assert_eq!(config.voice.locale, "da-DK");
        assert_eq!(config.voice.voice, "alloy");
        assert_eq!(config.cache.capacity, 100);
    }
}
