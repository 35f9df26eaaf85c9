//! Per-frame audio level sampling
//!
//! Each frame the analyser's byte bins are averaged and divided by the
//! configured scale, giving a rough short-term power figure in [0, 100].
//! It is a meter, not a loudness model.

use super::{Analyser, FrequencyAnalysis};
use crate::error::MediaError;
use crate::media::{StreamHandle, StreamId};
use crate::settings::MeterSettings;
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Upper bound of the level signal
pub const MAX_LEVEL: f32 = 100.0;

/// Mean bin magnitude divided by `scale`, clamped to [0, 100]
pub fn level_from_bins(bins: &[u8], scale: f32) -> f32 {
    if bins.is_empty() || !(scale > 0.0) {
        return 0.0;
    }
    let sum: u64 = bins.iter().map(|&b| b as u64).sum();
    let mean = sum as f32 / bins.len() as f32;
    (mean / scale).clamp(0.0, MAX_LEVEL)
}

/// Starts sampling loops on audio tracks
#[derive(Debug, Clone)]
pub struct AudioLevelMonitor {
    settings: MeterSettings,
}

impl AudioLevelMonitor {
    pub fn new(settings: MeterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MeterSettings {
        &self.settings
    }

    /// Attach an analyser to the stream's audio track and start sampling
    /// once per frame. Must be called from within a tokio runtime.
    pub fn start<F: FrequencyAnalysis>(
        &self,
        analysis: &F,
        handle: &StreamHandle,
    ) -> Result<MonitorHandle, MediaError> {
        let track = handle.audio_track().ok_or_else(|| {
            MediaError::AnalysisAttach(format!("stream {} has no audio track", handle.id()))
        })?;
        let analyser = analysis.attach(track)?;
        MonitorHandle::spawn(handle.id(), Box::new(analyser), &self.settings)
    }
}

struct Shared {
    running: AtomicBool,
    analyser: Mutex<Box<dyn Analyser>>,
}

impl Shared {
    fn analyser(&self) -> MutexGuard<'_, Box<dyn Analyser>> {
        self.analyser.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A running sampling loop bound to one stream.
///
/// Must be stopped before the stream it samples is released. Dropping the
/// handle stops it too, but owners stop it explicitly so the order is
/// never left to drop order.
pub struct MonitorHandle {
    stream_id: StreamId,
    levels: watch::Receiver<f32>,
    shared: Option<Arc<Shared>>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    fn spawn(
        stream_id: StreamId,
        analyser: Box<dyn Analyser>,
        settings: &MeterSettings,
    ) -> Result<Self, MediaError> {
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            analyser: Mutex::new(analyser),
        });

        let frame_period = settings.frame_period();
        if frame_period.is_zero() {
            shared.analyser().detach();
            return Err(MediaError::AnalysisAttach(format!(
                "frame rate {} gives no sampling period",
                settings.frame_rate
            )));
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                shared.analyser().detach();
                return Err(MediaError::AnalysisAttach(format!("no async runtime: {}", e)));
            }
        };

        let (sender, levels) = watch::channel(0.0);
        let task = runtime.spawn(sampling_loop(
            shared.clone(),
            sender,
            settings.level_scale,
            frame_period,
        ));
        debug!("Started level monitor for stream {}", stream_id);

        Ok(Self {
            stream_id,
            levels,
            shared: Some(shared),
            task: Some(task),
        })
    }

    /// A monitor that never samples and always reads zero. Used when the
    /// analyser could not be attached.
    pub fn silent(stream_id: StreamId) -> Self {
        let (_, levels) = watch::channel(0.0);
        Self {
            stream_id,
            levels,
            shared: None,
            task: None,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Whether the sampling loop is still active
    pub fn is_running(&self) -> bool {
        self.shared.is_some()
    }

    /// Most recent level
    pub fn level(&self) -> f32 {
        *self.levels.borrow()
    }

    /// Subscribe to level updates
    pub fn samples(&self) -> LevelSamples {
        let mut levels = self.levels.clone();
        levels.borrow_and_update();
        LevelSamples { levels }
    }

    /// Cancel sampling and detach the analyser. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        shared.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        // Waits out a sample in flight on another thread
        shared.analyser().detach();
        debug!("Stopped level monitor for stream {}", self.stream_id);
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Level values as they are produced, one per sampled frame.
///
/// Ends once the monitor stops. Subscribe again after a restart.
pub struct LevelSamples {
    levels: watch::Receiver<f32>,
}

impl LevelSamples {
    /// Wait for the next level. `None` once the monitor has stopped.
    pub async fn next(&mut self) -> Option<f32> {
        self.levels.changed().await.ok()?;
        Some(*self.levels.borrow_and_update())
    }
}

async fn sampling_loop(
    shared: Arc<Shared>,
    sender: watch::Sender<f32>,
    scale: f32,
    frame_period: Duration,
) {
    let mut frames = tokio::time::interval(frame_period);
    // Under load frames are dropped rather than bunched up
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut bins = Vec::new();

    loop {
        frames.tick().await;

        let level = {
            let mut analyser = shared.analyser();
            if !shared.running.load(Ordering::SeqCst) {
                break;
            }
            bins.resize(analyser.frequency_bin_count(), 0);
            analyser.byte_frequency_data(&mut bins);
            level_from_bins(&bins, scale)
        };

        trace!("Audio level {:.1}", level);
        // Notifies even when the level is unchanged
        sender.send_replace(level);
    }
}
