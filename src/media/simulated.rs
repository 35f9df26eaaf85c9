//! In-process capture backend
//!
//! Behaves like a permissioned platform with exclusive devices: each
//! microphone produces a steady tone, cameras produce nothing to sample.
//! Every call is journaled so callers can check ordering.

use super::{Constraints, MediaCapture, TrackInfo};
use crate::error::MediaError;
use crate::media::Track;
use crate::meter::{Analyser, FrequencyAnalysis, SpectrumAnalyser};
use crate::models::{Device, DeviceKind};
use crate::settings::{DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Tone cycles per analysis window, so the tone lands on one bin
const TONE_CYCLES: usize = 8;

/// One observed call into the backend
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCall {
    RequestPermission,
    Enumerate,
    Acquire(Constraints),
    StopTrack { track_id: String },
    SetEnabled { track_id: String, enabled: bool },
    Attach { track_id: String },
    Sample { track_id: String },
    Detach { track_id: String },
}

#[derive(Debug)]
struct SimTrack {
    kind: DeviceKind,
    device_id: String,
    enabled: bool,
    stopped: bool,
}

#[derive(Debug)]
struct SimState {
    devices: Vec<Device>,
    permission_denied: bool,
    enumeration_fails: bool,
    analysis_fails: bool,
    busy: HashSet<String>,
    input_levels: HashMap<String, f32>,
    tracks: HashMap<String, SimTrack>,
    journal: Vec<MediaCall>,
    overlapping_acquisitions: usize,
    stale_samples: usize,
    fft_size: usize,
    smoothing: f32,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            permission_denied: false,
            enumeration_fails: false,
            analysis_fails: false,
            busy: HashSet::new(),
            input_levels: HashMap::new(),
            tracks: HashMap::new(),
            journal: Vec::new(),
            overlapping_acquisitions: 0,
            stale_samples: 0,
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl SimState {
    fn live_tracks(&self) -> impl Iterator<Item = &SimTrack> {
        self.tracks.values().filter(|t| !t.stopped)
    }

    fn pick_device(&self, kind: DeviceKind, wanted: Option<&str>) -> Result<String, MediaError> {
        let device = match wanted {
            Some(id) => self
                .devices
                .iter()
                .find(|d| d.kind == kind && d.id == id)
                .ok_or_else(|| MediaError::MediaAcquisition(format!("{} {} not found", kind, id)))?,
            None => self
                .devices
                .iter()
                .find(|d| d.kind == kind)
                .ok_or_else(|| MediaError::MediaAcquisition(format!("no {} available", kind)))?,
        };

        let held = self.live_tracks().any(|t| t.device_id == device.id);
        if held || self.busy.contains(&device.id) {
            return Err(MediaError::MediaAcquisition(format!(
                "{} {} is busy",
                kind, device.id
            )));
        }
        Ok(device.id.clone())
    }
}

/// Simulated capture platform. Clones share the same devices and journal.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMedia {
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two microphones and two cameras with labels
    pub fn with_demo_devices() -> Self {
        let media = Self::new().with_devices(vec![
            Device::new("mic-builtin", DeviceKind::AudioInput, "Built-in Microphone"),
            Device::new("mic-usb-headset", DeviceKind::AudioInput, "USB Headset"),
            Device::new("cam-integrated", DeviceKind::VideoInput, "Integrated Camera"),
            Device::new("cam-external", DeviceKind::VideoInput, "External Webcam"),
        ]);
        media.set_input_level("mic-builtin", 0.3);
        media.set_input_level("mic-usb-headset", 0.05);
        media
    }

    pub fn with_devices(self, devices: impl IntoIterator<Item = Device>) -> Self {
        self.state().devices.extend(devices);
        self
    }

    pub fn deny_permission(self) -> Self {
        self.state().permission_denied = true;
        self
    }

    pub fn fail_enumeration(self) -> Self {
        self.state().enumeration_fails = true;
        self
    }

    /// Window and smoothing used by attached analysers
    pub fn with_spectrum(self, fft_size: usize, smoothing: f32) -> Self {
        {
            let mut state = self.state();
            state.fft_size = fft_size;
            state.smoothing = smoothing;
        }
        self
    }

    pub fn set_permission_denied(&self, denied: bool) {
        self.state().permission_denied = denied;
    }

    /// Mark a device as held by another application
    pub fn set_busy(&self, device_id: &str, busy: bool) {
        let mut state = self.state();
        if busy {
            state.busy.insert(device_id.to_string());
        } else {
            state.busy.remove(device_id);
        }
    }

    /// Make analyser attachment fail
    pub fn fail_analysis(&self, fail: bool) {
        self.state().analysis_fails = fail;
    }

    /// Tone amplitude (0.0 - 1.0) produced by a microphone
    pub fn set_input_level(&self, device_id: &str, amplitude: f32) {
        self.state()
            .input_levels
            .insert(device_id.to_string(), amplitude.clamp(0.0, 1.0));
    }

    pub fn journal(&self) -> Vec<MediaCall> {
        self.state().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state().journal.clear();
    }

    pub fn live_track_count(&self) -> usize {
        self.state().live_tracks().count()
    }

    pub fn is_track_enabled(&self, track_id: &str) -> Option<bool> {
        self.state().tracks.get(track_id).map(|t| t.enabled)
    }

    /// Acquisitions that started while another stream was still live
    pub fn overlapping_acquisitions(&self) -> usize {
        self.state().overlapping_acquisitions
    }

    /// Samples read from tracks that had already been stopped
    pub fn stale_samples(&self) -> usize {
        self.state().stale_samples
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MediaCapture for SimulatedMedia {
    async fn request_permission(&self) -> Result<(), MediaError> {
        let mut state = self.state();
        state.journal.push(MediaCall::RequestPermission);
        if state.permission_denied {
            return Err(MediaError::PermissionDenied(
                "user dismissed the capture prompt".to_string(),
            ));
        }
        Ok(())
    }

    async fn enumerate_devices(&self) -> Result<Vec<Device>, MediaError> {
        let mut state = self.state();
        state.journal.push(MediaCall::Enumerate);
        if state.enumeration_fails {
            return Err(MediaError::DeviceEnumeration(
                "device list unavailable".to_string(),
            ));
        }
        Ok(state.devices.clone())
    }

    async fn acquire(&self, constraints: &Constraints) -> Result<Vec<TrackInfo>, MediaError> {
        let mut state = self.state();
        state.journal.push(MediaCall::Acquire(constraints.clone()));

        if state.live_tracks().next().is_some() {
            warn!("Acquisition started while another stream is live");
            state.overlapping_acquisitions += 1;
        }
        if state.permission_denied {
            return Err(MediaError::MediaAcquisition(
                "capture permission revoked".to_string(),
            ));
        }
        if !constraints.requests_anything() {
            return Err(MediaError::MediaAcquisition(
                "no track kinds requested".to_string(),
            ));
        }

        // Resolve everything first so a failure opens nothing
        let mut picks = Vec::new();
        for &kind in DeviceKind::all() {
            if constraints.is_requested(kind) {
                picks.push((kind, state.pick_device(kind, constraints.device_id(kind))?));
            }
        }

        let tracks: Vec<TrackInfo> = picks
            .into_iter()
            .map(|(kind, device_id)| TrackInfo {
                id: Uuid::new_v4().to_string(),
                kind,
                device_id,
            })
            .collect();
        for info in &tracks {
            state.tracks.insert(
                info.id.clone(),
                SimTrack {
                    kind: info.kind,
                    device_id: info.device_id.clone(),
                    enabled: true,
                    stopped: false,
                },
            );
        }
        debug!("Simulated acquisition opened {} track(s)", tracks.len());
        Ok(tracks)
    }

    fn stop_track(&self, track_id: &str) {
        let mut state = self.state();
        state.journal.push(MediaCall::StopTrack {
            track_id: track_id.to_string(),
        });
        if let Some(track) = state.tracks.get_mut(track_id) {
            track.stopped = true;
        }
    }

    fn set_track_enabled(&self, track_id: &str, enabled: bool) {
        let mut state = self.state();
        state.journal.push(MediaCall::SetEnabled {
            track_id: track_id.to_string(),
            enabled,
        });
        if let Some(track) = state.tracks.get_mut(track_id) {
            track.enabled = enabled;
        }
    }
}

impl FrequencyAnalysis for SimulatedMedia {
    type Analyser = SimulatedAnalyser;

    fn attach(&self, track: &Track) -> Result<SimulatedAnalyser, MediaError> {
        let mut state = self.state();
        if state.analysis_fails {
            return Err(MediaError::AnalysisAttach(
                "audio graph unavailable".to_string(),
            ));
        }
        let live_audio = state
            .tracks
            .get(track.id())
            .is_some_and(|t| t.kind == DeviceKind::AudioInput && !t.stopped);
        if !live_audio {
            return Err(MediaError::AnalysisAttach(format!(
                "track {} is not a live audio track",
                track.id()
            )));
        }

        state.journal.push(MediaCall::Attach {
            track_id: track.id().to_string(),
        });
        let spectrum = SpectrumAnalyser::new(state.fft_size, state.smoothing);
        Ok(SimulatedAnalyser {
            media: self.clone(),
            track_id: track.id().to_string(),
            frame: vec![0.0; spectrum.fft_size()],
            spectrum,
            attached: true,
        })
    }
}

/// Analyser over a simulated microphone track
pub struct SimulatedAnalyser {
    media: SimulatedMedia,
    track_id: String,
    spectrum: SpectrumAnalyser,
    frame: Vec<f32>,
    attached: bool,
}

impl Analyser for SimulatedAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.spectrum.bin_count()
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        let amplitude = {
            let mut state = self.media.state();
            state.journal.push(MediaCall::Sample {
                track_id: self.track_id.clone(),
            });
            let track = state
                .tracks
                .get(&self.track_id)
                .map(|t| (t.stopped, t.enabled, t.device_id.clone()));
            match track {
                Some((true, _, _)) => {
                    state.stale_samples += 1;
                    0.0
                }
                // Disabled tracks deliver silence
                Some((false, true, device_id)) => {
                    state.input_levels.get(&device_id).copied().unwrap_or(0.0)
                }
                _ => 0.0,
            }
        };

        let len = self.frame.len();
        for (i, sample) in self.frame.iter_mut().enumerate() {
            *sample = amplitude * (2.0 * PI * TONE_CYCLES as f32 * i as f32 / len as f32).sin();
        }
        self.spectrum.process(&self.frame, bins);
    }

    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        self.media.state().journal.push(MediaCall::Detach {
            track_id: self.track_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media() -> SimulatedMedia {
        SimulatedMedia::new().with_devices(vec![
            Device::new("a1", DeviceKind::AudioInput, "Mic"),
            Device::new("v1", DeviceKind::VideoInput, "Cam"),
        ])
    }

    fn audio_only() -> Constraints {
        Constraints {
            audio_requested: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_devices_are_exclusive() {
        let media = media();
        media.acquire(&audio_only()).await.unwrap();

        let err = media.acquire(&audio_only()).await.unwrap_err();
        assert!(matches!(err, MediaError::MediaAcquisition(_)));
        assert_eq!(media.overlapping_acquisitions(), 1);
    }

    #[tokio::test]
    async fn test_unknown_device_fails_without_opening_anything() {
        let media = media();
        let constraints = Constraints {
            audio_device_id: Some("a1".to_string()),
            video_device_id: Some("nope".to_string()),
            audio_requested: true,
            video_requested: true,
        };
        assert!(media.acquire(&constraints).await.is_err());
        assert_eq!(media.live_track_count(), 0);
    }

    #[tokio::test]
    async fn test_revoked_permission_fails_acquisition() {
        let media = media();
        media.set_permission_denied(true);
        let err = media.acquire(&audio_only()).await.unwrap_err();
        assert!(matches!(err, MediaError::MediaAcquisition(_)));
    }

    #[tokio::test]
    async fn test_analyser_follows_track_state() {
        let media = media();
        media.set_input_level("a1", 0.5);
        let info = media.acquire(&audio_only()).await.unwrap().remove(0);
        let track = Track::from_info(info);

        let mut analyser = media.attach(&track).unwrap();
        let mut bins = vec![0u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut bins);
        assert!(bins.iter().any(|&b| b > 0));

        media.stop_track(track.id());
        analyser.byte_frequency_data(&mut bins);
        assert_eq!(media.stale_samples(), 1);

        analyser.detach();
        analyser.detach();
        let detaches = media
            .journal()
            .iter()
            .filter(|c| matches!(c, MediaCall::Detach { .. }))
            .count();
        assert_eq!(detaches, 1);
    }
}
