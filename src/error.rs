//! Error types for device setup
//!
//! None of these are fatal to the page: each is surfaced and the page keeps
//! its current state until the user acts again.

use crate::models::DeviceKind;
use crate::state::PageState;
use thiserror::Error;

/// Failures reported by the media collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to enumerate devices: {0}")]
    DeviceEnumeration(String),

    #[error("Failed to acquire media stream: {0}")]
    MediaAcquisition(String),

    #[error("Failed to attach audio analyser: {0}")]
    AnalysisAttach(String),
}

/// Failures of page-level actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreJoinError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Unknown {kind} device: {device_id}")]
    UnknownDevice { kind: DeviceKind, device_id: String },

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: PageState,
        action: &'static str,
    },
}
