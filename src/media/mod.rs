//! Capture device access
//!
//! This module provides:
//! - Device discovery after the permission prompt
//! - A single exclusively owned capture stream per page
//! - Enabling and disabling tracks without giving up the devices
//! - An in-process simulated backend, plus PipeWire behind the `pipewire` feature

mod catalog;
#[cfg(feature = "pipewire")]
mod pipewire_backend;
mod session;
mod simulated;
mod toggle;

pub use catalog::DeviceCatalog;
#[cfg(feature = "pipewire")]
pub use pipewire_backend::{PipeWireAnalyser, PipeWireMedia};
pub use session::{StreamHandle, StreamId, StreamSession, Track};
pub use simulated::{MediaCall, SimulatedAnalyser, SimulatedMedia};
pub use toggle::TrackToggle;

use crate::error::MediaError;
use crate::models::{Device, DeviceKind, Selection};

/// What to ask the platform for when opening a stream.
///
/// A missing device id means any device of that kind will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    pub audio_device_id: Option<String>,
    pub video_device_id: Option<String>,
    pub audio_requested: bool,
    pub video_requested: bool,
}

impl Constraints {
    pub fn from_selection(selection: &Selection, audio_requested: bool, video_requested: bool) -> Self {
        let non_empty = |id: &str| (!id.is_empty()).then(|| id.to_string());
        Self {
            audio_device_id: non_empty(&selection.audio_device_id),
            video_device_id: non_empty(&selection.video_device_id),
            audio_requested,
            video_requested,
        }
    }

    pub fn device_id(&self, kind: DeviceKind) -> Option<&str> {
        match kind {
            DeviceKind::AudioInput => self.audio_device_id.as_deref(),
            DeviceKind::VideoInput => self.video_device_id.as_deref(),
        }
    }

    pub fn is_requested(&self, kind: DeviceKind) -> bool {
        match kind {
            DeviceKind::AudioInput => self.audio_requested,
            DeviceKind::VideoInput => self.video_requested,
        }
    }

    pub fn requests_anything(&self) -> bool {
        self.audio_requested || self.video_requested
    }
}

/// A track as opened by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: String,
    pub kind: DeviceKind,
    pub device_id: String,
}

/// Platform capture service.
///
/// Opening tracks may suspend; stopping them and flipping their enabled
/// flag never does.
#[allow(async_fn_in_trait)]
pub trait MediaCapture {
    /// Ask the user for capture access. Labels stay generic until granted.
    async fn request_permission(&self) -> Result<(), MediaError>;

    /// All capture devices in platform order
    async fn enumerate_devices(&self) -> Result<Vec<Device>, MediaError>;

    /// Open one track per requested kind
    async fn acquire(&self, constraints: &Constraints) -> Result<Vec<TrackInfo>, MediaError>;

    /// Stop a track and free its device. Stopping twice is harmless.
    fn stop_track(&self, track_id: &str);

    /// Mute or unmute a track while keeping the device open
    fn set_track_enabled(&self, track_id: &str, enabled: bool);
}
