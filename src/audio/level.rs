//! Loudness analysis and the periodic level monitor
//!
//! [`SpectrumLevel`] turns a short window of samples into one normalized
//! loudness value: Hann-windowed forward FFT, per-bin magnitude mapped
//! through a fixed dB range, averaged across bins. [`AudioLevelMonitor`]
//! polls the audio frontend at a fixed cadence and streams the resulting
//! [`LevelSample`]s to the recording episode.

use std::sync::Arc;
use std::time::Duration;

use rustfft::{FftPlanner, num_complex::Complex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::AudioFrontend;

/// Quietest bin amplitude that still registers, in dBFS
const MIN_DB: f32 = -60.0;

/// Bin amplitude mapped to full scale, in dBFS
const MAX_DB: f32 = 0.0;

/// One normalized loudness reading
#[derive(Debug, Clone, Copy)]
pub struct LevelSample {
    /// Loudness in [0, 1]
    pub level: f32,

    /// When the reading was taken
    pub at: Instant,
}

/// Short-time spectral loudness analyzer
pub struct SpectrumLevel {
    fft_size: usize,
    planner: FftPlanner<f32>,
    window: Vec<f32>,
}

impl SpectrumLevel {
    /// Default FFT window size (32ms at 16kHz)
    pub const DEFAULT_FFT_SIZE: usize = 512;

    /// Create an analyzer with the default window size
    #[must_use]
    pub fn new() -> Self {
        Self::with_fft_size(Self::DEFAULT_FFT_SIZE)
    }

    /// Create an analyzer with a custom FFT window size
    #[must_use]
    pub fn with_fft_size(fft_size: usize) -> Self {
        // Hann window to reduce spectral leakage
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos())
            })
            .collect();

        Self {
            fft_size,
            planner: FftPlanner::new(),
            window,
        }
    }

    /// Number of samples the analyzer wants per reading
    #[must_use]
    pub const fn window_len(&self) -> usize {
        self.fft_size
    }

    /// Compute the normalized loudness of the most recent window
    ///
    /// Uses the last `fft_size` samples, zero-padding when fewer are
    /// available. Result is the mean over frequency bins of each bin's
    /// dB-mapped magnitude, in [0, 1].
    pub fn level(&mut self, samples: &[f32]) -> f32 {
        let start = samples.len().saturating_sub(self.fft_size);
        let recent = &samples[start..];

        let mut buf: Vec<Complex<f32>> = recent
            .iter()
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        buf.resize(self.fft_size, Complex::new(0.0, 0.0));

        let fft = self.planner.plan_fft_forward(self.fft_size);
        fft.process(&mut buf);

        let bins = self.fft_size / 2;
        if bins == 0 {
            return 0.0;
        }

        let scale = 2.0 / self.fft_size as f32;
        let sum: f32 = buf[..bins]
            .iter()
            .map(|c| {
                let amplitude = (c.norm() * scale).max(1e-10);
                let db = 20.0 * amplitude.log10();
                ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0)
            })
            .sum();

        sum / bins as f32
    }
}

impl Default for SpectrumLevel {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancelable periodic task sampling the frontend's loudness
///
/// Produces a lazy, infinite, non-restartable sequence of [`LevelSample`]s.
/// `stop` consumes the monitor; dropping it also halts sampling, so an
/// aborted recording episode cannot leak the polling task.
pub struct AudioLevelMonitor {
    rx: mpsc::Receiver<LevelSample>,
    task: JoinHandle<()>,
}

impl AudioLevelMonitor {
    /// Start sampling `frontend` every `cadence`
    #[must_use]
    pub fn start(frontend: Arc<dyn AudioFrontend>, cadence: Duration) -> Self {
        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(cadence);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tick.tick().await;
                let sample = LevelSample {
                    level: frontend.level(),
                    at: Instant::now(),
                };
                if tx.send(sample).await.is_err() {
                    break;
                }
            }
        });

        Self { rx, task }
    }

    /// Receive the next level sample
    ///
    /// Returns `None` once the monitor has been stopped.
    pub async fn recv(&mut self) -> Option<LevelSample> {
        self.rx.recv().await
    }

    /// Halt sampling
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for AudioLevelMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
