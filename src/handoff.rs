//! Handing the final configuration to the next stage
//!
//! The room re-acquires its own media from the record; nothing captured
//! here outlives the page.

use crate::models::{HandoffRecord, Selection, ToggleState};
use log::info;

/// Build the immutable record passed to the room
pub fn package(room_id: &str, selection: &Selection, toggles: ToggleState) -> HandoffRecord {
    let record = HandoffRecord::new(room_id, selection, toggles);
    info!(
        "Packaged handoff for {} (audio={:?} enabled={}, video={:?} enabled={})",
        record.destination(),
        record.audio_device_id(),
        record.audio_enabled(),
        record.video_device_id(),
        record.video_enabled()
    );
    record
}

/// Where the page goes when it is done
pub trait Navigator {
    /// Advance into the room carrying the chosen configuration
    fn enter_room(&mut self, record: &HandoffRecord);

    /// Go back to the entry screen
    fn return_home(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_copies_state() {
        let selection = Selection::new("a1", "v1");
        let toggles = ToggleState {
            audio_enabled: true,
            video_enabled: false,
        };
        let record = package("room-7", &selection, toggles);

        assert_eq!(record.room_id(), "room-7");
        assert_eq!(record.audio_device_id(), "a1");
        assert_eq!(record.video_device_id(), "v1");
        assert!(record.audio_enabled());
        assert!(!record.video_enabled());
    }

    #[test]
    fn test_room_id_forwarded_unchanged() {
        let record = package("  Weird/Room?id ", &Selection::default(), ToggleState::default());
        assert_eq!(record.room_id(), "  Weird/Room?id ");
        assert_eq!(record.audio_device_id(), "");
    }
}
