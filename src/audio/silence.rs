//! Sustained-silence detection over the loudness stream
//!
//! The detector watches [`LevelSample`]s and confirms end-of-utterance at
//! most once per silence episode. The pending timer is modeled as an
//! explicit deadline: the first sub-threshold sample after a non-silent
//! period arms it, later quiet samples never re-arm it, and a loud sample
//! cancels it.

use std::time::Duration;

use tokio::time::Instant;

use super::LevelSample;

/// Silence detection parameters
#[derive(Debug, Clone, Copy)]
pub struct SilenceConfig {
    /// Normalized loudness below which a sample counts as silent
    pub threshold: f32,

    /// How long silence must hold before it is confirmed
    pub sustained: Duration,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            sustained: Duration::from_millis(1000),
        }
    }
}

/// State machine confirming sustained silence
#[derive(Debug)]
pub struct SilenceDetector {
    config: SilenceConfig,
    deadline: Option<Instant>,
    is_silent: bool,
    fired: bool,
}

impl SilenceDetector {
    /// Create a detector with the given configuration
    #[must_use]
    pub fn new(config: SilenceConfig) -> Self {
        Self {
            config,
            deadline: None,
            is_silent: false,
            fired: false,
        }
    }

    /// Feed one level sample; returns `true` exactly once per confirmed
    /// silence episode
    pub fn observe(&mut self, sample: &LevelSample) -> bool {
        if sample.level >= self.config.threshold {
            if self.deadline.take().is_some() {
                tracing::trace!(level = sample.level, "silence timer canceled");
            }
            self.is_silent = false;
            self.fired = false;
            return false;
        }

        self.is_silent = true;

        if self.fired {
            return false;
        }

        match self.deadline {
            None => {
                self.deadline = Some(sample.at + self.config.sustained);
                tracing::trace!(level = sample.level, "silence timer armed");
                false
            }
            Some(deadline) if sample.at >= deadline => {
                self.deadline = None;
                self.fired = true;
                tracing::debug!("silence confirmed");
                true
            }
            Some(_) => false,
        }
    }

    /// True while the most recent sample was below the threshold
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        self.is_silent
    }

    /// True while a silence deadline is pending
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Forget any pending deadline and episode state
    pub fn reset(&mut self) {
        self.deadline = None;
        self.is_silent = false;
        self.fired = false;
    }
}
