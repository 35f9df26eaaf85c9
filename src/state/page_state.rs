use crate::models::DeviceKind;
use std::fmt;

/// Lifecycle of the setup page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageState {
    /// Permission not requested yet, or the last request failed
    #[default]
    Idle,
    /// Devices listed and defaults selected, no preview running
    Enumerated,
    /// A stream is (or was last attempted to be) previewing
    Previewing,
    /// Handed off to the room
    Joined,
    /// User left without joining
    Aborted,
}

impl PageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PageState::Joined | PageState::Aborted)
    }

    /// Whether device lists are available for picking
    pub fn has_devices(&self) -> bool {
        matches!(self, PageState::Enumerated | PageState::Previewing)
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageState::Idle => "idle",
            PageState::Enumerated => "enumerated",
            PageState::Previewing => "previewing",
            PageState::Joined => "joined",
            PageState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Discrete inputs driving the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// Ask for capture permission and list devices (also the retry path)
    RequestPermission,
    SelectionChanged { kind: DeviceKind, device_id: String },
    TogglePressed(DeviceKind),
    JoinPressed,
    BackPressed,
    Unmount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PageState::Joined.is_terminal());
        assert!(PageState::Aborted.is_terminal());
        assert!(!PageState::Previewing.is_terminal());
        assert_eq!(PageState::default(), PageState::Idle);
    }

    #[test]
    fn test_device_lists_available() {
        assert!(!PageState::Idle.has_devices());
        assert!(PageState::Enumerated.has_devices());
        assert!(PageState::Previewing.has_devices());
        assert!(!PageState::Joined.has_devices());
    }
}
