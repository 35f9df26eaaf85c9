//! Mute and unmute without releasing devices

use super::{MediaCapture, StreamHandle};
use crate::models::DeviceKind;
use log::debug;

/// Flips the enabled flag on tracks of a live stream.
///
/// The device stays open, so unmuting never shows a reacquisition gap.
pub struct TrackToggle;

impl TrackToggle {
    /// Set `enabled` on every track of `kind` in `handle`.
    /// Returns the number of tracks touched.
    pub fn set_enabled<C: MediaCapture>(
        capture: &C,
        handle: &mut StreamHandle,
        kind: DeviceKind,
        enabled: bool,
    ) -> usize {
        let mut count = 0;
        for track in handle.tracks_of_mut(kind) {
            capture.set_track_enabled(track.id(), enabled);
            track.set_enabled(enabled);
            count += 1;
        }
        debug!(
            "Set {} {} track(s) of stream {} enabled={}",
            count,
            kind,
            handle.id(),
            enabled
        );
        count
    }
}
