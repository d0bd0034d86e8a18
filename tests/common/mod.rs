//! Shared test fakes for the conversation loop
//!
//! Levels, transcripts, replies, and audio bytes are all scripted so the
//! controller and scheduler can be driven deterministically under tokio's
//! paused clock.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use samtal::audio::AudioFrontend;
use samtal::controller::{ControllerConfig, Phase, RecordingController, SessionEvent};
use samtal::services::{
    DialogueGenerator, DialogueReply, DialogueRequest, SpeechSynthesizer, SynthesisRequest,
    Transcriber, TranscriptionRequest,
};
use samtal::{Error, Result, SpeechCache};

/// Scripted audio frontend
///
/// `level()` pops the next scripted value; the final value repeats forever.
pub struct FakeAudio {
    levels: Mutex<VecDeque<f32>>,
    pub acquires: AtomicUsize,
    pub releases: AtomicUsize,
    pub plays: AtomicUsize,
    active: AtomicBool,
    fail_acquire: bool,
}

impl FakeAudio {
    pub fn new(levels: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            levels: Mutex::new(levels.into_iter().collect()),
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            plays: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            fail_acquire: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            levels: Mutex::new(VecDeque::new()),
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            plays: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            fail_acquire: true,
        })
    }

    pub fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioFrontend for FakeAudio {
    async fn acquire(&self) -> Result<()> {
        if self.fail_acquire {
            return Err(Error::Acquisition("no input device".to_string()));
        }
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(Error::Acquisition("capture already active".to_string()));
        }
        self.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<Vec<u8>> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Err(Error::Audio("no active capture".to_string()));
        }
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(b"RIFFfake".to_vec())
    }

    fn level(&self) -> f32 {
        let mut levels = self.levels.lock().unwrap();
        if levels.len() > 1 {
            levels.pop_front().unwrap()
        } else {
            levels.front().copied().unwrap_or(0.0)
        }
    }

    async fn play(&self, _audio: &[u8]) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted transcriber
pub struct FakeTranscriber {
    results: Mutex<VecDeque<Result<String>>>,
    default: String,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(VecDeque::new()),
            default: text.to_string(),
            delay: None,
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// Never responds faster than `delay`
    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(VecDeque::new()),
            default: text.to_string(),
            delay: Some(delay),
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// Blocks until the returned notify is signalled
    pub fn gated(text: &str) -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let transcriber = Arc::new(Self {
            results: Mutex::new(VecDeque::new()),
            default: text.to_string(),
            delay: None,
            gate: Some(Arc::clone(&gate)),
            calls: AtomicUsize::new(0),
        });
        (transcriber, gate)
    }

    /// Queue one result ahead of the default
    pub fn push(&self, result: Result<String>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _request: &TranscriptionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(self.default.clone()))
    }
}

/// Scripted dialogue generator
pub struct FakeDialogue {
    reply: String,
    translation: String,
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeDialogue {
    pub fn ok(reply: &str, translation: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            translation: translation.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: String::new(),
            translation: String::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DialogueGenerator for FakeDialogue {
    async fn respond(&self, _request: &DialogueRequest) -> Result<DialogueReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(Error::MalformedReply("missing translation".to_string()));
        }

        Ok(DialogueReply {
            reply: self.reply.clone(),
            translation: self.translation.clone(),
        })
    }
}

/// Scripted speech synthesizer
pub struct FakeSynthesizer {
    audio: Vec<u8>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            audio: vec![0xFF, 0xF3, 0x01, 0x02],
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            audio: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(Error::Synthesis("voice service down".to_string()));
        }

        Ok(self.audio.clone())
    }
}

/// Everything a controller test needs in one place
pub struct Harness {
    pub controller: Arc<RecordingController>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub audio: Arc<FakeAudio>,
    pub transcriber: Arc<FakeTranscriber>,
    pub dialogue: Arc<FakeDialogue>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub cache: Arc<SpeechCache>,
}

/// Controller config tuned for fast virtual-time tests
pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        cadence: Duration::from_millis(10),
        ..ControllerConfig::default()
    }
}

/// Build a harness around scripted levels and default fakes
pub fn harness(levels: Vec<f32>) -> Harness {
    harness_with(
        levels,
        FakeTranscriber::ok("Hej, hur m\u{e5}r du?"),
        FakeDialogue::ok("Jag m\u{e5}r bra, tack!", "I'm fine, thanks!"),
        FakeSynthesizer::ok(),
        test_config(),
    )
}

/// Build a harness with explicit collaborators
pub fn harness_with(
    levels: Vec<f32>,
    transcriber: Arc<FakeTranscriber>,
    dialogue: Arc<FakeDialogue>,
    synthesizer: Arc<FakeSynthesizer>,
    config: ControllerConfig,
) -> Harness {
    let audio = FakeAudio::new(levels);
    let cache = Arc::new(SpeechCache::new(Duration::from_secs(3600), 100));

    let (controller, events) = RecordingController::with_receiver(
        config,
        Arc::clone(&audio) as Arc<dyn AudioFrontend>,
        Arc::clone(&transcriber) as Arc<dyn Transcriber>,
        Arc::clone(&dialogue) as Arc<dyn DialogueGenerator>,
        Arc::clone(&synthesizer) as Arc<dyn SpeechSynthesizer>,
        Arc::clone(&cache),
    );

    Harness {
        controller: Arc::new(controller),
        events,
        audio,
        transcriber,
        dialogue,
        synthesizer,
        cache,
    }
}

/// Await a phase under the paused clock
pub async fn wait_for_phase(controller: &RecordingController, phase: Phase) {
    let mut rx = controller.watch_phase();
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            if *rx.borrow() == phase {
                return;
            }
            if rx.changed().await.is_err() {
                panic!("phase channel closed");
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {phase:?}"));
}

/// Await an arbitrary condition under the paused clock
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(600), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting until {what}"));
}
