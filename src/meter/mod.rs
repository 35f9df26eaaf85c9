//! Live audio level metering
//!
//! This module provides:
//! - The analyser seam the platform plugs into
//! - A software byte-spectrum analyser for backends that hand out PCM
//! - The per-frame sampling loop and its cancellation handle

mod monitor;
mod spectrum;

pub use monitor::{level_from_bins, AudioLevelMonitor, LevelSamples, MonitorHandle, MAX_LEVEL};
pub use spectrum::SpectrumAnalyser;

use crate::error::MediaError;
use crate::media::Track;

/// A frequency analyser bound to one audio track
pub trait Analyser: Send + 'static {
    /// Number of magnitude bins filled by each read
    fn frequency_bin_count(&self) -> usize;

    /// Fill `bins` with the current magnitudes, 0 - 255 per bin
    fn byte_frequency_data(&mut self, bins: &mut [u8]);

    /// Disconnect from the track. No reads happen afterwards.
    fn detach(&mut self);
}

/// Platform service that attaches analysers to live audio tracks
pub trait FrequencyAnalysis {
    type Analyser: Analyser;

    fn attach(&self, track: &Track) -> Result<Self::Analyser, MediaError>;
}
