//! Command-line interface for the prejoin demo
//!
//! Handles argument parsing and logging configuration.

use clap::Parser;
use log::LevelFilter;
use prejoin::MeterSettings;

/// Prejoin - pick a microphone and camera, then join a room
#[derive(Parser, Debug)]
#[command(name = "prejoin")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Room to join once devices are set up
    pub room_id: String,

    /// Microphone to select after the defaults are applied
    #[arg(long, value_name = "DEVICE_ID")]
    pub audio: Option<String>,

    /// Camera to select after the defaults are applied
    #[arg(long, value_name = "DEVICE_ID")]
    pub video: Option<String>,

    /// Join with the microphone disabled
    #[arg(long)]
    pub mute_audio: bool,

    /// Join with the camera disabled
    #[arg(long)]
    pub mute_video: bool,

    /// How many meter frames to show before joining
    #[arg(long, default_value_t = 30)]
    pub frames: usize,

    /// Leave without joining
    #[arg(long)]
    pub back: bool,

    /// Capture from PipeWire instead of the built-in simulated devices
    #[arg(long)]
    pub pipewire: bool,

    /// Divisor applied to the mean spectrum magnitude
    #[arg(long)]
    pub level_scale: Option<f32>,

    /// Meter sampling rate in frames per second
    #[arg(long)]
    pub frame_rate: Option<u32>,

    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace (includes per-frame levels)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    /// Command-line overrides win over stored settings
    pub fn apply_overrides(&self, mut settings: MeterSettings) -> MeterSettings {
        if let Some(scale) = self.level_scale {
            settings.level_scale = scale;
        }
        if let Some(rate) = self.frame_rate {
            settings.frame_rate = rate;
        }
        settings.validated()
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    // Set prejoin modules to requested verbosity level
    builder.filter_module("prejoin", args.log_level());

    // PipeWire bindings only at -vvvv
    if args.verbose >= 4 {
        builder.filter_module("pipewire", args.log_level());
    }

    builder.format_timestamp_millis().init();
}
