//! Audio capture, playback, and loudness analysis
//!
//! The cpal-backed frontend lives on a dedicated audio thread (cpal streams
//! are not `Send`); the rest of the crate talks to it through the
//! [`AudioFrontend`] trait so tests can substitute a scripted fake.

mod capture;
mod device;
mod level;
mod playback;
mod silence;

pub use capture::{CaptureStream, SAMPLE_RATE, samples_to_wav};
pub use device::CpalFrontend;
pub use level::{AudioLevelMonitor, LevelSample, SpectrumLevel};
pub use playback::AudioPlayback;
pub use silence::{SilenceConfig, SilenceDetector};

use async_trait::async_trait;

use crate::Result;

/// Microphone and speaker seam used by the recording controller
///
/// The microphone stream is exclusively owned by the active recording
/// episode: `acquire` fails while a capture is already active, and
/// `release` must complete before the next episode may start.
#[async_trait]
pub trait AudioFrontend: Send + Sync {
    /// Open the input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Acquisition`] if the device cannot be opened
    /// or a capture is already active
    async fn acquire(&self) -> Result<()>;

    /// Stop capturing, release the device, and return the captured
    /// utterance as WAV bytes
    ///
    /// # Errors
    ///
    /// Returns error if no capture is active or encoding fails
    async fn release(&self) -> Result<Vec<u8>>;

    /// Current normalized loudness in [0, 1]
    fn level(&self) -> f32;

    /// Play synthesized audio (MP3 bytes) to completion
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    async fn play(&self, audio: &[u8]) -> Result<()>;
}
