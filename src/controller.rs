//! Recording controller — the conversation-loop state machine
//!
//! Serializes the capture/transcribe/think/speak phases of one voice turn
//! and owns the conversation message list. All collaborators are injected:
//! the audio frontend, the three external services, and the speech cache.
//!
//! Exclusivity is enforced by refusing to start capture rather than by
//! interrupting an in-flight phase. Every deferred action (silence
//! confirmation, the spawned pipeline) re-validates the episode generation
//! and phase before acting, so late callbacks are no-ops.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audio::{AudioFrontend, AudioLevelMonitor, SilenceConfig, SilenceDetector};
use crate::cache::SpeechCache;
use crate::message::ConversationMessage;
use crate::services::{
    DialogueGenerator, DialogueRequest, SpeechSynthesizer, SynthesisRequest, Transcriber,
    TranscriptionRequest,
};
use crate::timeout::guard;
use crate::{Error, Result};

/// Controller phase for one conversation episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for a start command
    Idle,
    /// Capturing microphone audio
    Recording,
    /// Utterance submitted for transcription
    Transcribing,
    /// Transcript submitted to the dialogue generator
    Thinking,
    /// Reply being synthesized and played back
    Speaking,
}

/// The three independent processing flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingFlags {
    /// Transcription in flight
    pub transcribing: bool,
    /// Dialogue generation in flight
    pub thinking: bool,
    /// Synthesis or playback in flight
    pub speaking: bool,
}

impl ProcessingFlags {
    /// True when any phase is in flight
    #[must_use]
    pub const fn any(self) -> bool {
        self.transcribing || self.thinking || self.speaking
    }
}

/// Notifications emitted for the surrounding UI
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The controller changed phase
    Phase(Phase),
    /// A fresh loudness reading while recording
    Level(f32),
    /// Snapshot of the ordered conversation message list
    Messages(Vec<ConversationMessage>),
}

/// What ended a recording episode
#[derive(Debug, Clone, Copy)]
enum StopCause {
    Silence,
    Manual,
}

/// Controller tuning and texts
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Silence detection parameters
    pub silence: SilenceConfig,

    /// Level sampling cadence
    pub cadence: Duration,

    /// Deadline for each guarded collaborator call
    pub call_deadline: Duration,

    /// Practice-language locale
    pub locale: String,

    /// TTS voice selection
    pub voice: String,

    /// Conversation topic identifier
    pub topic: String,

    /// Placeholder content shown while transcribing
    pub placeholder: String,

    /// Apology text in the practice language
    pub apology: String,

    /// Translation of the apology
    pub apology_translation: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let messages = crate::config::MessageSettings::default();
        Self {
            silence: SilenceConfig::default(),
            cadence: Duration::from_millis(16),
            call_deadline: crate::timeout::DEFAULT_DEADLINE,
            locale: "sv-SE".to_string(),
            voice: "alloy".to_string(),
            topic: "vardagsliv".to_string(),
            placeholder: messages.placeholder,
            apology: messages.apology,
            apology_translation: messages.apology_translation,
        }
    }
}

impl From<&crate::Config> for ControllerConfig {
    fn from(config: &crate::Config) -> Self {
        Self {
            silence: SilenceConfig {
                threshold: config.silence.threshold,
                sustained: config.silence.sustained(),
            },
            cadence: config.silence.cadence(),
            call_deadline: config.services.deadline(),
            locale: config.voice.locale.clone(),
            voice: config.voice.voice.clone(),
            topic: config.voice.topic.clone(),
            placeholder: config.messages.placeholder.clone(),
            apology: config.messages.apology.clone(),
            apology_translation: config.messages.apology_translation.clone(),
        }
    }
}

/// One active recording episode
struct Episode {
    generation: u64,
    level_task: JoinHandle<()>,
}

struct Shared {
    config: ControllerConfig,
    audio: Arc<dyn AudioFrontend>,
    transcriber: Arc<dyn Transcriber>,
    dialogue: Arc<dyn DialogueGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cache: Arc<SpeechCache>,
    phase: watch::Sender<Phase>,
    transcribing: AtomicBool,
    thinking: AtomicBool,
    speaking: AtomicBool,
    muted: AtomicBool,
    generation: AtomicU64,
    episode: Mutex<Option<Episode>>,
    messages: Mutex<Vec<ConversationMessage>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// The conversation-loop state machine
pub struct RecordingController {
    shared: Arc<Shared>,
}

impl RecordingController {
    /// Create a controller and the event receiver for the surrounding UI
    #[must_use]
    pub fn with_receiver(
        config: ControllerConfig,
        audio: Arc<dyn AudioFrontend>,
        transcriber: Arc<dyn Transcriber>,
        dialogue: Arc<dyn DialogueGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        cache: Arc<SpeechCache>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (phase, _) = watch::channel(Phase::Idle);

        let shared = Arc::new(Shared {
            config,
            audio,
            transcriber,
            dialogue,
            synthesizer,
            cache,
            phase,
            transcribing: AtomicBool::new(false),
            thinking: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            episode: Mutex::new(None),
            messages: Mutex::new(Vec::new()),
            events,
        });

        (Self { shared }, events_rx)
    }

    /// Begin a recording episode
    ///
    /// Rejected as a no-op (returning `Ok(false)`) while already recording
    /// or while any processing flag is set.
    ///
    /// # Errors
    ///
    /// Returns error if microphone acquisition fails; an apology message is
    /// appended and the controller stays idle
    pub async fn start_recording(&self) -> Result<bool> {
        let shared = &self.shared;

        {
            let _episode = shared.episode.lock().expect("state lock poisoned");
            let phase = *shared.phase.borrow();
            if phase == Phase::Recording || shared.flags().any() {
                tracing::debug!(?phase, flags = ?shared.flags(), "start recording rejected");
                return Ok(false);
            }
            shared.set_phase(Phase::Recording);
        }

        if let Err(e) = shared.audio.acquire().await {
            tracing::error!(error = %e, "microphone acquisition failed");
            {
                let _episode = shared.episode.lock().expect("state lock poisoned");
                shared.set_phase(Phase::Idle);
            }
            shared.append_apology();
            return Err(Error::Acquisition(e.to_string()));
        }

        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let monitor = AudioLevelMonitor::start(Arc::clone(&shared.audio), shared.config.cadence);
        let level_task = tokio::spawn(Shared::run_capture(
            Arc::clone(shared),
            generation,
            monitor,
        ));

        {
            let mut episode = shared.episode.lock().expect("state lock poisoned");
            *episode = Some(Episode {
                generation,
                level_task,
            });
        }

        tracing::info!(generation, "recording started");
        Ok(true)
    }

    /// Stop the current recording episode and process the utterance
    ///
    /// A manual stop takes precedence over silence-based auto-stop: the
    /// level task (and with it any pending silence deadline) is aborted at
    /// the moment of the stop. No-op when nothing is recording.
    pub fn stop_recording(&self) {
        let generation = self
            .shared
            .episode
            .lock()
            .expect("state lock poisoned")
            .as_ref()
            .map(|e| e.generation);

        match generation {
            Some(generation) => {
                Shared::finish_episode(&self.shared, generation, StopCause::Manual);
            }
            None => tracing::debug!("stop requested with no active episode"),
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.shared.phase.borrow()
    }

    /// Watch phase transitions
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.shared.phase.subscribe()
    }

    /// Current processing flags
    #[must_use]
    pub fn flags(&self) -> ProcessingFlags {
        self.shared.flags()
    }

    /// True when idle with no processing flag set
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.phase() == Phase::Idle && !self.flags().any()
    }

    /// Snapshot of the ordered conversation
    #[must_use]
    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.shared
            .messages
            .lock()
            .expect("state lock poisoned")
            .clone()
    }

    /// Mute or unmute playback; synthesis and caching still run while muted
    pub fn set_muted(&self, muted: bool) {
        self.shared.muted.store(muted, Ordering::SeqCst);
        tracing::debug!(muted, "playback mute changed");
    }

    /// Current mute state
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::SeqCst)
    }
}

impl Shared {
    fn flags(&self) -> ProcessingFlags {
        ProcessingFlags {
            transcribing: self.transcribing.load(Ordering::SeqCst),
            thinking: self.thinking.load(Ordering::SeqCst),
            speaking: self.speaking.load(Ordering::SeqCst),
        }
    }

    /// Update the phase and notify observers; callers hold the episode lock
    /// when the transition must be atomic with episode bookkeeping
    fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
        let _ = self.events.send(SessionEvent::Phase(phase));
    }

    fn emit_messages(&self) {
        let snapshot = self.messages.lock().expect("state lock poisoned").clone();
        let _ = self.events.send(SessionEvent::Messages(snapshot));
    }

    fn append_apology(&self) {
        self.messages
            .lock()
            .expect("state lock poisoned")
            .push(ConversationMessage::apology(
                &self.config.apology,
                &self.config.apology_translation,
            ));
        self.emit_messages();
    }

    /// Consume level samples until silence is confirmed or the episode is
    /// stopped from outside
    async fn run_capture(shared: Arc<Self>, generation: u64, mut monitor: AudioLevelMonitor) {
        let mut detector = SilenceDetector::new(shared.config.silence);

        while let Some(sample) = monitor.recv().await {
            let _ = shared.events.send(SessionEvent::Level(sample.level));

            if detector.observe(&sample) {
                Self::finish_episode(&shared, generation, StopCause::Silence);
                break;
            }
        }
    }

    /// Transition `Recording -> Transcribing` and hand the utterance to the
    /// processing pipeline
    ///
    /// Validates generation and phase first: a silence confirmation or stop
    /// command arriving after the episode already ended is a no-op.
    fn finish_episode(shared: &Arc<Self>, generation: u64, cause: StopCause) {
        let episode = {
            let mut episode = shared.episode.lock().expect("state lock poisoned");
            let matches = episode
                .as_ref()
                .is_some_and(|e| e.generation == generation)
                && *shared.phase.borrow() == Phase::Recording;

            if !matches {
                tracing::debug!(generation, ?cause, "stale stop ignored");
                return;
            }

            shared.transcribing.store(true, Ordering::SeqCst);
            shared.set_phase(Phase::Transcribing);
            episode.take()
        };

        let Some(episode) = episode else { return };
        episode.level_task.abort();

        let placeholder = ConversationMessage::placeholder(&shared.config.placeholder);
        let placeholder_id = placeholder.id;
        shared
            .messages
            .lock()
            .expect("state lock poisoned")
            .push(placeholder);
        shared.emit_messages();

        tracing::info!(generation, ?cause, "recording stopped");
        tokio::spawn(Self::run_pipeline(Arc::clone(shared), placeholder_id));
    }

    /// Transcribe, think, speak, and return to idle
    async fn run_pipeline(shared: Arc<Self>, placeholder_id: Uuid) {
        let wav = match shared.audio.release().await {
            Ok(wav) => wav,
            Err(e) => return shared.fail_turn(placeholder_id, &e),
        };

        // Transcribe
        let request = TranscriptionRequest {
            audio_wav: wav,
            locale: shared.config.locale.clone(),
            prompt_hint: Some(shared.config.topic.clone()),
        };
        let transcript = match guard(
            "transcription",
            shared.config.call_deadline,
            shared.transcriber.transcribe(&request),
        )
        .await
        {
            Ok(text) => text,
            Err(e) => return shared.fail_turn(placeholder_id, &e),
        };

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return shared.fail_turn(placeholder_id, &Error::NoSpeechDetected);
        }

        {
            let mut messages = shared.messages.lock().expect("state lock poisoned");
            if let Some(message) = messages.iter_mut().find(|m| m.id == placeholder_id) {
                message.content.clone_from(&transcript);
                message.processing = false;
            }
        }
        shared.emit_messages();

        shared.transcribing.store(false, Ordering::SeqCst);
        shared.thinking.store(true, Ordering::SeqCst);
        shared.set_phase(Phase::Thinking);

        // Think
        let request = DialogueRequest {
            text: transcript,
            topic: shared.config.topic.clone(),
        };
        let reply = match guard(
            "dialogue",
            shared.config.call_deadline,
            shared.dialogue.respond(&request),
        )
        .await
        {
            Ok(reply) => reply,
            Err(e) => return shared.fail_turn(placeholder_id, &e),
        };

        shared
            .messages
            .lock()
            .expect("state lock poisoned")
            .push(ConversationMessage::assistant(
                &reply.reply,
                &reply.translation,
            ));
        shared.emit_messages();

        shared.thinking.store(false, Ordering::SeqCst);
        shared.speaking.store(true, Ordering::SeqCst);
        shared.set_phase(Phase::Speaking);

        // Speak: cache first, then synthesis; failures here are non-fatal —
        // the assistant text stays, only the audio is skipped
        let audio = match shared.cache.get(&reply.reply) {
            Some(bytes) => Some(bytes),
            None => {
                let request = SynthesisRequest {
                    text: reply.reply.clone(),
                    locale: shared.config.locale.clone(),
                    voice: shared.config.voice.clone(),
                };
                match guard(
                    "synthesis",
                    shared.config.call_deadline,
                    shared.synthesizer.synthesize(&request),
                )
                .await
                {
                    Ok(bytes) => {
                        shared.cache.put(reply.reply.clone(), bytes.clone());
                        Some(bytes)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "synthesis failed, skipping playback");
                        None
                    }
                }
            }
        };

        if let Some(bytes) = audio {
            if shared.muted.load(Ordering::SeqCst) {
                tracing::debug!("playback muted");
            } else if let Err(e) = shared.audio.play(&bytes).await {
                tracing::warn!(error = %e, "playback failed");
            }
        }

        shared.speaking.store(false, Ordering::SeqCst);
        shared.set_phase(Phase::Idle);
        tracing::info!("turn complete");
    }

    /// Abandon the turn: drop the placeholder, apologize, return to idle
    fn fail_turn(&self, placeholder_id: Uuid, error: &Error) {
        tracing::error!(error = %error, timeout = error.is_timeout(), "conversation turn failed");

        {
            let mut messages = self.messages.lock().expect("state lock poisoned");
            messages.retain(|m| !(m.id == placeholder_id && m.processing));
            messages.push(ConversationMessage::apology(
                &self.config.apology,
                &self.config.apology_translation,
            ));
        }
        self.emit_messages();

        self.transcribing.store(false, Ordering::SeqCst);
        self.thinking.store(false, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
        self.set_phase(Phase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_any() {
        assert!(!ProcessingFlags::default().any());
        assert!(ProcessingFlags {
            thinking: true,
            ..Default::default()
        }
        .any());
    }

    #[test]
    fn controller_config_from_config() {
        let config = crate::Config::default();
        let controller_config = ControllerConfig::from(&config);
        assert!((controller_config.silence.threshold - 0.1).abs() < f32::EPSILON);
        assert_eq!(
            controller_config.call_deadline,
            Duration::from_millis(10_000)
        );
        assert_eq!(controller_config.locale, "sv-SE");
    }
}
