//! Capture device discovery

use super::MediaCapture;
use crate::error::MediaError;
use crate::models::{Device, DeviceKind, Selection};
use log::{debug, info};

/// Devices found after the permission prompt, split by kind in platform order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCatalog {
    audio_inputs: Vec<Device>,
    video_inputs: Vec<Device>,
}

impl DeviceCatalog {
    /// Request capture permission, then enumerate.
    ///
    /// Permission comes first because most platforms hide device labels
    /// until access has been granted.
    pub async fn request_permission_and_enumerate<C: MediaCapture>(
        capture: &C,
    ) -> Result<Self, MediaError> {
        capture.request_permission().await?;
        debug!("Capture permission granted");

        let devices = capture.enumerate_devices().await?;
        let catalog = Self::from_devices(devices);
        info!(
            "Found {} microphone(s) and {} camera(s)",
            catalog.audio_inputs.len(),
            catalog.video_inputs.len()
        );
        Ok(catalog)
    }

    /// Split an enumeration result by kind, keeping order
    pub fn from_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let (audio_inputs, video_inputs) = devices
            .into_iter()
            .partition(|d| d.kind == DeviceKind::AudioInput);
        Self {
            audio_inputs,
            video_inputs,
        }
    }

    /// Id of the first device, or an empty string when there is none
    pub fn default_selection(devices: &[Device]) -> String {
        devices.first().map(|d| d.id.clone()).unwrap_or_default()
    }

    /// Default selection for both kinds
    pub fn default_selection_pair(&self) -> Selection {
        Selection::new(
            Self::default_selection(&self.audio_inputs),
            Self::default_selection(&self.video_inputs),
        )
    }

    /// Keep ids that still exist, fall back to defaults for the rest
    pub fn reconcile(&self, selection: &Selection) -> Selection {
        let mut reconciled = Selection::default();
        for &kind in DeviceKind::all() {
            let current = selection.device_id(kind);
            let id = if self.find(kind, current).is_some() {
                current.to_string()
            } else {
                Self::default_selection(self.devices(kind))
            };
            reconciled.set_device_id(kind, id);
        }
        reconciled
    }

    pub fn devices(&self, kind: DeviceKind) -> &[Device] {
        match kind {
            DeviceKind::AudioInput => &self.audio_inputs,
            DeviceKind::VideoInput => &self.video_inputs,
        }
    }

    pub fn audio_inputs(&self) -> &[Device] {
        &self.audio_inputs
    }

    pub fn video_inputs(&self) -> &[Device] {
        &self.video_inputs
    }

    pub fn find(&self, kind: DeviceKind, device_id: &str) -> Option<&Device> {
        self.devices(kind).iter().find(|d| d.id == device_id)
    }

    pub fn has(&self, kind: DeviceKind) -> bool {
        !self.devices(kind).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.audio_inputs.is_empty() && self.video_inputs.is_empty()
    }
}
