//! Exclusive ownership of the live capture stream

use super::{Constraints, MediaCapture, TrackInfo, TrackToggle};
use crate::error::MediaError;
use crate::models::DeviceKind;
use log::{debug, info};
use std::fmt;
use uuid::Uuid;

/// Identity of one acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(Uuid);

impl StreamId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First block is plenty to tell streams apart in logs
        let id = self.0.to_string();
        f.write_str(&id[..8])
    }
}

/// One audio or video signal inside a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    id: String,
    kind: DeviceKind,
    device_id: String,
    enabled: bool,
}

impl Track {
    pub(crate) fn from_info(info: TrackInfo) -> Self {
        Self {
            id: info.id,
            kind: info.kind,
            device_id: info.device_id,
            enabled: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Ownership token over the tracks of one acquisition.
///
/// Only [`StreamSession`] creates and destroys these.
#[derive(Debug)]
pub struct StreamHandle {
    id: StreamId,
    tracks: Vec<Track>,
}

impl StreamHandle {
    fn new(tracks: Vec<TrackInfo>) -> Self {
        Self {
            id: StreamId::new(),
            tracks: tracks.into_iter().map(Track::from_info).collect(),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: DeviceKind) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    pub(crate) fn tracks_of_mut(&mut self, kind: DeviceKind) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut().filter(move |t| t.kind == kind)
    }

    pub fn audio_track(&self) -> Option<&Track> {
        self.tracks_of(DeviceKind::AudioInput).next()
    }

    /// Device actually opened for a kind, which may differ from the
    /// request when the platform picked a fallback
    pub fn device_id(&self, kind: DeviceKind) -> Option<&str> {
        self.tracks_of(kind).next().map(Track::device_id)
    }
}

/// Holds the page's single capture stream.
///
/// The active handle lives in one cell: `acquire` fills it, `release`
/// empties it, and a new acquisition is refused while it is occupied.
pub struct StreamSession<C: MediaCapture> {
    capture: C,
    active: Option<StreamHandle>,
}

impl<C: MediaCapture> StreamSession<C> {
    pub fn new(capture: C) -> Self {
        Self {
            capture,
            active: None,
        }
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn handle(&self) -> Option<&StreamHandle> {
        self.active.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.active.is_some()
    }

    /// Open a new stream. The previous one must already be released.
    pub async fn acquire(&mut self, constraints: &Constraints) -> Result<&StreamHandle, MediaError> {
        if let Some(active) = &self.active {
            return Err(MediaError::MediaAcquisition(format!(
                "stream {} still holds the devices",
                active.id
            )));
        }

        debug!("Acquiring stream with {:?}", constraints);
        let tracks = self.capture.acquire(constraints).await?;
        let handle = StreamHandle::new(tracks);
        info!(
            "Acquired stream {} ({} track(s))",
            handle.id,
            handle.tracks.len()
        );
        Ok(self.active.insert(handle))
    }

    /// Stop every track of the active stream. Returns the released id, or
    /// `None` when nothing was live.
    pub fn release(&mut self) -> Option<StreamId> {
        let handle = self.active.take()?;
        for track in &handle.tracks {
            self.capture.stop_track(&track.id);
        }
        info!("Released stream {}", handle.id);
        Some(handle.id)
    }

    /// Apply an enabled flag to the active stream's tracks of one kind.
    /// Returns how many tracks were touched.
    pub fn set_enabled(&mut self, kind: DeviceKind, enabled: bool) -> usize {
        match self.active.as_mut() {
            Some(handle) => TrackToggle::set_enabled(&self.capture, handle, kind, enabled),
            None => 0,
        }
    }
}

impl<C: MediaCapture> Drop for StreamSession<C> {
    fn drop(&mut self) {
        self.release();
    }
}
