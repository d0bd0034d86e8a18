//! Audio capture from the microphone

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Upper bound on buffered utterance audio (two minutes)
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 120;

/// An open input stream accumulating one utterance
///
/// Owned by the audio thread for the duration of a recording episode. The
/// stream callback feeds two buffers: the full utterance (drained by
/// [`CaptureStream::finish`]) and a short rolling window shared with the
/// loudness analyzer.
pub struct CaptureStream {
    stream: Stream,
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl CaptureStream {
    /// Open the default input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns [`Error::Acquisition`] if no suitable device or config is
    /// available or the stream cannot be started
    pub fn open(window: Arc<Mutex<VecDeque<f32>>>, window_len: usize) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Acquisition("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Acquisition(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Acquisition("no suitable input config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "opening capture stream"
        );

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let callback_buffer = Arc::clone(&buffer);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = callback_buffer.lock() {
                        if buf.len() < MAX_UTTERANCE_SAMPLES {
                            buf.extend_from_slice(data);
                        }
                    }
                    if let Ok(mut win) = window.lock() {
                        win.extend(data.iter().copied());
                        while win.len() > window_len {
                            win.pop_front();
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Acquisition(e.to_string()))?;

        stream.play().map_err(|e| Error::Acquisition(e.to_string()))?;
        tracing::debug!("capture started");

        Ok(Self { stream, buffer })
    }

    /// Stop capturing and encode the accumulated utterance as WAV bytes
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn finish(self) -> Result<Vec<u8>> {
        drop(self.stream);

        let samples = self
            .buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        tracing::debug!(samples = samples.len(), "capture stopped");
        samples_to_wav(&samples, SAMPLE_RATE)
    }
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
