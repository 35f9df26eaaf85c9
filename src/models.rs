use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of capture endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    #[serde(rename = "audioinput")]
    AudioInput,
    #[serde(rename = "videoinput")]
    VideoInput,
}

impl DeviceKind {
    /// Both kinds, audio first
    pub fn all() -> &'static [DeviceKind] {
        &[DeviceKind::AudioInput, DeviceKind::VideoInput]
    }

    /// Name shown for an unlabeled device of this kind
    pub fn display_name(&self) -> &'static str {
        match self {
            DeviceKind::AudioInput => "Microphone",
            DeviceKind::VideoInput => "Camera",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::AudioInput => f.write_str("audio input"),
            DeviceKind::VideoInput => f.write_str("video input"),
        }
    }
}

/// A capture device as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Opaque id, stable for the lifetime of the page
    pub id: String,
    pub kind: DeviceKind,
    /// Human readable label; may be empty before permission is granted
    pub label: String,
}

impl Device {
    pub fn new(id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }

    /// Label for pickers, falling back to the kind plus a short id prefix
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            let short_id: String = self.id.chars().take(8).collect();
            format!("{} {}", self.kind.display_name(), short_id)
        } else {
            self.label.clone()
        }
    }
}

/// The user's chosen devices. An empty id means nothing is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub audio_device_id: String,
    pub video_device_id: String,
}

impl Selection {
    pub fn new(audio_device_id: impl Into<String>, video_device_id: impl Into<String>) -> Self {
        Self {
            audio_device_id: audio_device_id.into(),
            video_device_id: video_device_id.into(),
        }
    }

    pub fn device_id(&self, kind: DeviceKind) -> &str {
        match kind {
            DeviceKind::AudioInput => &self.audio_device_id,
            DeviceKind::VideoInput => &self.video_device_id,
        }
    }

    pub fn set_device_id(&mut self, kind: DeviceKind, device_id: impl Into<String>) {
        match kind {
            DeviceKind::AudioInput => self.audio_device_id = device_id.into(),
            DeviceKind::VideoInput => self.video_device_id = device_id.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.audio_device_id.is_empty() && self.video_device_id.is_empty()
    }
}

/// Whether each kind of track is enabled (unmuted)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleState {
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl Default for ToggleState {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            video_enabled: true,
        }
    }
}

impl ToggleState {
    pub fn is_enabled(&self, kind: DeviceKind) -> bool {
        match kind {
            DeviceKind::AudioInput => self.audio_enabled,
            DeviceKind::VideoInput => self.video_enabled,
        }
    }

    pub fn set_enabled(&mut self, kind: DeviceKind, enabled: bool) {
        match kind {
            DeviceKind::AudioInput => self.audio_enabled = enabled,
            DeviceKind::VideoInput => self.video_enabled = enabled,
        }
    }
}

/// Final device configuration handed to the room.
///
/// Built once by [`crate::handoff::package`]; fields are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRecord {
    room_id: String,
    audio_device_id: String,
    video_device_id: String,
    audio_enabled: bool,
    video_enabled: bool,
}

impl HandoffRecord {
    pub(crate) fn new(room_id: &str, selection: &Selection, toggles: ToggleState) -> Self {
        Self {
            room_id: room_id.to_string(),
            audio_device_id: selection.audio_device_id.clone(),
            video_device_id: selection.video_device_id.clone(),
            audio_enabled: toggles.audio_enabled,
            video_enabled: toggles.video_enabled,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn audio_device_id(&self) -> &str {
        &self.audio_device_id
    }

    pub fn video_device_id(&self) -> &str {
        &self.video_device_id
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    /// Route of the room this record is destined for
    pub fn destination(&self) -> String {
        format!("/room/{}", self.room_id)
    }
}
