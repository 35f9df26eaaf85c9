//! Level meter settings with optional dconf overrides
//!
//! Overrides are read from dconf under `/com/watchparty/prejoin/`. Nothing is
//! written back; device choices are never persisted.

use log::{debug, warn};
use std::time::Duration;

const DCONF_PATH: &str = "/com/watchparty/prejoin/";

/// Keys for dconf settings
mod keys {
    pub const LEVEL_SCALE: &str = "level-scale";
    pub const FRAME_RATE: &str = "frame-rate";
    pub const FFT_SIZE: &str = "fft-size";
    pub const SMOOTHING: &str = "smoothing";
}

/// Divisor applied to the mean bin magnitude. A full-scale spectrum
/// (255 / 1.28 ≈ 199) clamps to 100.
pub const DEFAULT_LEVEL_SCALE: f32 = 1.28;
pub const DEFAULT_FRAME_RATE: u32 = 60;
pub const DEFAULT_FFT_SIZE: usize = 256;
pub const DEFAULT_SMOOTHING: f32 = 0.8;

/// Highest sampling cadence accepted from settings
pub const MAX_FRAME_RATE: u32 = 240;
/// Largest analysis window accepted from settings
pub const MAX_FFT_SIZE: usize = 32768;

/// Tuning for the audio level meter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSettings {
    /// Empirical divisor turning a mean byte magnitude into a 0-100 level
    pub level_scale: f32,
    /// Target sampling cadence in frames per second
    pub frame_rate: u32,
    /// Analysis window length in samples for software analysers
    pub fft_size: usize,
    /// Time smoothing between successive spectra (0.0 - 1.0)
    pub smoothing: f32,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            level_scale: DEFAULT_LEVEL_SCALE,
            frame_rate: DEFAULT_FRAME_RATE,
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl MeterSettings {
    /// Defaults overridden by whatever dconf has set
    pub fn load() -> Self {
        Self::from_lookup(|name| {
            let key = format!("{}{}", DCONF_PATH, name);
            dconf_rs::get_string(&key).ok()
        })
    }

    /// Build settings from a key lookup, ignoring values that don't parse
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(scale) = parse_value::<f32>(&lookup, keys::LEVEL_SCALE) {
            settings.level_scale = scale;
        }
        if let Some(rate) = parse_value::<u32>(&lookup, keys::FRAME_RATE) {
            settings.frame_rate = rate;
        }
        if let Some(size) = parse_value::<usize>(&lookup, keys::FFT_SIZE) {
            settings.fft_size = size;
        }
        if let Some(smoothing) = parse_value::<f32>(&lookup, keys::SMOOTHING) {
            settings.smoothing = smoothing;
        }

        settings.validated()
    }

    /// Replace out-of-range values with defaults
    pub fn validated(mut self) -> Self {
        if !(self.level_scale.is_finite() && self.level_scale > 0.0) {
            warn!("Ignoring invalid level scale {}", self.level_scale);
            self.level_scale = DEFAULT_LEVEL_SCALE;
        }
        if self.frame_rate == 0 {
            warn!("Ignoring zero frame rate");
            self.frame_rate = DEFAULT_FRAME_RATE;
        } else if self.frame_rate > MAX_FRAME_RATE {
            warn!(
                "Frame rate {} too high, using {}",
                self.frame_rate, MAX_FRAME_RATE
            );
            self.frame_rate = MAX_FRAME_RATE;
        }
        if !(32..=MAX_FFT_SIZE).contains(&self.fft_size) || self.fft_size % 2 != 0 {
            warn!("Ignoring invalid analysis window size {}", self.fft_size);
            self.fft_size = DEFAULT_FFT_SIZE;
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            warn!("Ignoring invalid smoothing {}", self.smoothing);
            self.smoothing = DEFAULT_SMOOTHING;
        }
        self
    }

    /// Time between two meter samples
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

fn parse_value<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = lookup(name)?;
    // dconf prints strings GVariant-quoted
    let trimmed = raw.trim().trim_matches('\'');
    match trimmed.parse() {
        Ok(value) => {
            debug!("Meter setting {} = {}", name, trimmed);
            Some(value)
        }
        Err(_) => {
            warn!("Ignoring unparsable meter setting {} = {:?}", name, raw);
            None
        }
    }
}
