//! Daemon — wires the conversation loop together
//!
//! Builds the service clients from configuration, hands them to the
//! recording controller, and renders controller events to the terminal
//! until interrupted.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::CpalFrontend;
use crate::cache::SpeechCache;
use crate::controller::{ControllerConfig, RecordingController, SessionEvent};
use crate::message::{ConversationMessage, Role};
use crate::scheduler::{AutoRecordScheduler, SchedulerConfig};
use crate::services::{
    ChatDialogue, DialogueGenerator, SpeechSynthesis, SpeechSynthesizer, SpeechToText, Transcriber,
};
use crate::{Config, Error, Result};

/// The samtal daemon — runs one conversation session
pub struct Daemon {
    config: Config,
    muted: bool,
}

impl Daemon {
    /// Create a daemon from loaded configuration
    #[must_use]
    pub const fn new(config: Config, muted: bool) -> Self {
        Self { config, muted }
    }

    /// Run until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the audio frontend or a required service client
    /// cannot be constructed
    pub async fn run(self) -> Result<()> {
        let transcriber = build_transcriber(&self.config)?;
        let dialogue = build_dialogue(&self.config)?;
        let synthesizer = build_synthesizer(&self.config)?;

        let audio = Arc::new(CpalFrontend::new()?);
        let cache = Arc::new(SpeechCache::new(
            self.config.cache.ttl(),
            self.config.cache.capacity,
        ));

        let (controller, mut events) = RecordingController::with_receiver(
            ControllerConfig::from(&self.config),
            audio,
            transcriber,
            dialogue,
            synthesizer,
            cache,
        );
        let controller = Arc::new(controller);
        controller.set_muted(self.muted);

        let scheduler = AutoRecordScheduler::spawn(
            Arc::clone(&controller),
            SchedulerConfig {
                rearm_delay: self.config.auto_record.rearm_delay(),
                enable_delay: self.config.auto_record.enable_delay(),
            },
        );

        tracing::info!(
            topic = %self.config.voice.topic,
            locale = %self.config.voice.locale,
            auto_record = self.config.auto_record.enabled,
            "samtal ready - start speaking"
        );

        if self.config.auto_record.enabled {
            scheduler.set_enabled(true);
        } else {
            controller.start_recording().await?;
        }

        // Shutdown on ctrl-c
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        let mut renderer = Renderer::default();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => renderer.render(&event),
                    None => break,
                }
            }
        }

        if controller.phase() == crate::controller::Phase::Recording {
            controller.stop_recording();
        }
        scheduler.set_enabled(false);

        tracing::info!("daemon stopped");
        Ok(())
    }
}

/// Prints conversation progress to the terminal
#[derive(Default)]
struct Renderer {
    printed: HashSet<Uuid>,
}

impl Renderer {
    fn render(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Phase(phase) => tracing::debug!(?phase, "phase changed"),
            SessionEvent::Level(level) => tracing::trace!(level, "loudness"),
            SessionEvent::Messages(messages) => {
                for message in messages {
                    if message.processing || self.printed.contains(&message.id) {
                        continue;
                    }
                    self.printed.insert(message.id);
                    print_message(message);
                }
            }
        }
    }
}

fn print_message(message: &ConversationMessage) {
    match message.role {
        Role::User => println!("you: {}", message.content),
        Role::Assistant => {
            println!("svar: {}", message.content);
            if let Some(translation) = &message.translation {
                println!("      ({translation})");
            }
        }
    }
}

/// Pick an STT backend from the available credentials: Deepgram when its
/// key is present, OpenAI Whisper otherwise
///
/// # Errors
///
/// Returns error if no STT credentials are configured
pub fn build_transcriber(config: &Config) -> Result<Arc<dyn Transcriber>> {
    if let Some(key) = &config.api_keys.deepgram {
        let model = if config.voice.stt_model == "whisper-1" {
            "nova-2".to_string()
        } else {
            config.voice.stt_model.clone()
        };
        tracing::info!(model = %model, "using Deepgram STT");
        return Ok(Arc::new(SpeechToText::new_deepgram(key.clone(), model)?));
    }

    if let Some(key) = &config.api_keys.openai {
        tracing::info!(model = %config.voice.stt_model, "using Whisper STT");
        return Ok(Arc::new(SpeechToText::new_whisper(
            key.clone(),
            config.voice.stt_model.clone(),
        )?));
    }

    Err(Error::Config(
        "no STT credentials: set OPENAI_API_KEY or DEEPGRAM_API_KEY".to_string(),
    ))
}

/// Build the dialogue client
///
/// # Errors
///
/// Returns error if no OpenAI credentials are configured
pub fn build_dialogue(config: &Config) -> Result<Arc<dyn DialogueGenerator>> {
    let key = config.api_keys.openai.as_ref().ok_or_else(|| {
        Error::Config("no dialogue credentials: set OPENAI_API_KEY".to_string())
    })?;

    tracing::info!(model = %config.voice.chat_model, "using chat dialogue");
    Ok(Arc::new(ChatDialogue::new(
        key.clone(),
        config.voice.chat_model.clone(),
        config.voice.locale.clone(),
    )?))
}

/// Pick a TTS backend from the available credentials: ElevenLabs when its
/// key is present, OpenAI otherwise
///
/// # Errors
///
/// Returns error if no TTS credentials are configured
pub fn build_synthesizer(config: &Config) -> Result<Arc<dyn SpeechSynthesizer>> {
    if let Some(key) = &config.api_keys.elevenlabs {
        let model = if config.voice.tts_model == "tts-1" {
            "eleven_multilingual_v2".to_string()
        } else {
            config.voice.tts_model.clone()
        };
        tracing::info!(model = %model, "using ElevenLabs TTS");
        return Ok(Arc::new(SpeechSynthesis::new_elevenlabs(
            key.clone(),
            model,
        )?));
    }

    if let Some(key) = &config.api_keys.openai {
        tracing::info!(model = %config.voice.tts_model, "using OpenAI TTS");
        return Ok(Arc::new(SpeechSynthesis::new_openai(
            key.clone(),
            config.voice.tts_model.clone(),
            config.voice.tts_speed,
        )?));
    }

    Err(Error::Config(
        "no TTS credentials: set OPENAI_API_KEY or ELEVENLABS_API_KEY".to_string(),
    ))
}
