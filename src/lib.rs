//! Prejoin - device setup before entering a watch party room
//!
//! Lists capture devices, previews the chosen microphone and camera, shows
//! a live input level, and hands the final choice to the room. At most one
//! capture stream and one level monitor are alive at any time.

pub mod error;
pub mod handoff;
pub mod media;
pub mod meter;
pub mod models;
pub mod settings;
pub mod state;

pub use error::{MediaError, PreJoinError};
pub use handoff::Navigator;
pub use media::{DeviceCatalog, MediaCapture, SimulatedMedia, StreamSession, TrackToggle};
pub use meter::{AudioLevelMonitor, FrequencyAnalysis};
pub use models::{Device, DeviceKind, HandoffRecord, Selection, ToggleState};
pub use settings::MeterSettings;
pub use state::{PageEvent, PageState, PreJoinPage};
