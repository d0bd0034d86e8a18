//! cpal-backed audio frontend
//!
//! cpal streams are not `Send`, so the streams live on a dedicated audio
//! thread driven by a command channel; replies come back over oneshot
//! channels. The loudness window is shared state readable from any task,
//! keeping `level()` a cheap synchronous call.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{AudioFrontend, AudioPlayback, CaptureStream, SpectrumLevel};
use crate::{Error, Result};

enum AudioCmd {
    Acquire(oneshot::Sender<Result<()>>),
    Release(oneshot::Sender<Result<Vec<u8>>>),
    Play(Vec<u8>, oneshot::Sender<Result<()>>),
}

/// Audio frontend backed by the default cpal input/output devices
pub struct CpalFrontend {
    cmds: mpsc::Sender<AudioCmd>,
    window: Arc<Mutex<VecDeque<f32>>>,
    analyzer: Mutex<SpectrumLevel>,
}

impl CpalFrontend {
    /// Spawn the audio thread
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned; device errors surface
    /// later from `acquire`/`play`
    pub fn new() -> Result<Self> {
        let analyzer = SpectrumLevel::new();
        let window_len = analyzer.window_len();
        let window: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));

        let (cmds, rx) = mpsc::channel::<AudioCmd>();
        let thread_window = Arc::clone(&window);

        std::thread::Builder::new()
            .name("samtal-audio".to_string())
            .spawn(move || audio_thread(&rx, &thread_window, window_len))
            .map_err(|e| Error::Audio(format!("failed to spawn audio thread: {e}")))?;

        Ok(Self {
            cmds,
            window,
            analyzer: Mutex::new(analyzer),
        })
    }

    fn send(&self, cmd: AudioCmd) -> Result<()> {
        self.cmds
            .send(cmd)
            .map_err(|_| Error::Audio("audio thread terminated".to_string()))
    }
}

#[async_trait]
impl AudioFrontend for CpalFrontend {
    async fn acquire(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(AudioCmd::Acquire(tx))?;
        rx.await
            .map_err(|_| Error::Audio("audio thread terminated".to_string()))?
    }

    async fn release(&self) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.send(AudioCmd::Release(tx))?;
        rx.await
            .map_err(|_| Error::Audio("audio thread terminated".to_string()))?
    }

    fn level(&self) -> f32 {
        let samples: Vec<f32> = match self.window.lock() {
            Ok(win) => win.iter().copied().collect(),
            Err(_) => return 0.0,
        };

        self.analyzer
            .lock()
            .map(|mut analyzer| analyzer.level(&samples))
            .unwrap_or(0.0)
    }

    async fn play(&self, audio: &[u8]) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(AudioCmd::Play(audio.to_vec(), tx))?;
        rx.await
            .map_err(|_| Error::Audio("audio thread terminated".to_string()))?
    }
}

/// Command loop owning the cpal streams; exits when the frontend is dropped
fn audio_thread(
    rx: &mpsc::Receiver<AudioCmd>,
    window: &Arc<Mutex<VecDeque<f32>>>,
    window_len: usize,
) {
    let mut capture: Option<CaptureStream> = None;
    let mut playback: Option<AudioPlayback> = None;

    while let Ok(cmd) = rx.recv() {
        match cmd {
            AudioCmd::Acquire(reply) => {
                let result = if capture.is_some() {
                    Err(Error::Acquisition("capture already active".to_string()))
                } else {
                    if let Ok(mut win) = window.lock() {
                        win.clear();
                    }
                    CaptureStream::open(Arc::clone(window), window_len).map(|stream| {
                        capture = Some(stream);
                    })
                };
                let _ = reply.send(result);
            }
            AudioCmd::Release(reply) => {
                let result = capture.take().map_or_else(
                    || Err(Error::Audio("no active capture".to_string())),
                    CaptureStream::finish,
                );
                if let Ok(mut win) = window.lock() {
                    win.clear();
                }
                let _ = reply.send(result);
            }
            AudioCmd::Play(audio, reply) => {
                if playback.is_none() {
                    match AudioPlayback::new() {
                        Ok(p) => playback = Some(p),
                        Err(e) => {
                            let _ = reply.send(Err(e));
                            continue;
                        }
                    }
                }
                let result = playback
                    .as_ref()
                    .map_or_else(
                        || Err(Error::Audio("playback unavailable".to_string())),
                        |p| p.play_mp3(&audio),
                    );
                let _ = reply.send(result);
            }
        }
    }

    tracing::debug!("audio thread stopped");
}
