//! Automatic capture re-arming
//!
//! Watches the controller's phase and schedules one delayed start command
//! whenever the controller settles back to idle. The delay lets the
//! previous episode's audio resources finish tearing down; the scheduled
//! start re-validates the controller state before firing, so a manual start
//! or a toggle-off during the delay silently drops it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::controller::{Phase, RecordingController};

/// Scheduling delays
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Delay before re-arming capture after a finished turn
    pub rearm_delay: Duration,

    /// Delay before the first capture when auto-record is switched on
    pub enable_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rearm_delay: Duration::from_millis(1000),
            enable_delay: Duration::from_millis(500),
        }
    }
}

struct Inner {
    controller: Arc<RecordingController>,
    config: SchedulerConfig,
    enabled: AtomicBool,
    pending: Mutex<Option<JoinHandle<()>>>,
}

/// Re-arms recording after the controller returns to idle
pub struct AutoRecordScheduler {
    inner: Arc<Inner>,
    observer: JoinHandle<()>,
}

impl AutoRecordScheduler {
    /// Spawn the phase observer; starts disabled
    #[must_use]
    pub fn spawn(controller: Arc<RecordingController>, config: SchedulerConfig) -> Self {
        let inner = Arc::new(Inner {
            controller,
            config,
            enabled: AtomicBool::new(false),
            pending: Mutex::new(None),
        });

        let observer = tokio::spawn(Inner::observe(Arc::clone(&inner)));

        Self { inner, observer }
    }

    /// Toggle auto-record
    ///
    /// Enabling while the controller is quiescent arms one delayed start
    /// (never an instantaneous one). Disabling cancels any armed start and,
    /// if recording is active, immediately issues a stop.
    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.inner.enabled.store(true, Ordering::SeqCst);
            tracing::info!("auto-record enabled");

            if self.inner.controller.is_quiescent() {
                Inner::arm(&self.inner, self.inner.config.enable_delay);
            }
        } else {
            self.inner.enabled.store(false, Ordering::SeqCst);
            Inner::cancel_pending(&self.inner);
            tracing::info!("auto-record disabled");

            if self.inner.controller.phase() == Phase::Recording {
                self.inner.controller.stop_recording();
            }
        }
    }

    /// Current enabled state
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }
}

impl Drop for AutoRecordScheduler {
    fn drop(&mut self) {
        self.observer.abort();
        Inner::cancel_pending(&self.inner);
    }
}

impl Inner {
    /// Watch phase transitions and arm on idle
    async fn observe(inner: Arc<Self>) {
        let mut phase_rx = inner.controller.watch_phase();

        while phase_rx.changed().await.is_ok() {
            let phase = *phase_rx.borrow();
            if phase == Phase::Idle && inner.enabled.load(Ordering::SeqCst) {
                Self::arm(&inner, inner.config.rearm_delay);
            }
        }
    }

    /// Arm one delayed start unless one is already pending
    fn arm(inner: &Arc<Self>, delay: Duration) {
        let mut pending = inner.pending.lock().expect("scheduler lock poisoned");

        if pending.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!("start already armed");
            return;
        }

        tracing::debug!(?delay, "arming auto-record start");
        let task_inner = Arc::clone(inner);
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // The user may have started manually or toggled auto-record off
            // during the delay
            if !task_inner.enabled.load(Ordering::SeqCst)
                || !task_inner.controller.is_quiescent()
            {
                tracing::debug!("scheduled start dropped");
                return;
            }

            match task_inner.controller.start_recording().await {
                Ok(true) => tracing::debug!("auto-record start fired"),
                Ok(false) => tracing::debug!("auto-record start rejected"),
                Err(e) => tracing::warn!(error = %e, "auto-record start failed"),
            }
        }));
    }

    fn cancel_pending(inner: &Arc<Self>) {
        if let Some(task) = inner
            .pending
            .lock()
            .expect("scheduler lock poisoned")
            .take()
        {
            task.abort();
        }
    }
}
