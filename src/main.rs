//! Prejoin - device setup before entering a watch party room
//!
//! Command-line front end: lists devices, applies the requested choices,
//! shows the input meter for a few frames and then joins or backs out.

mod cli;
mod tokio_runtime;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use prejoin::meter::MAX_LEVEL;
use prejoin::{
    DeviceKind, FrequencyAnalysis, HandoffRecord, MediaCapture, MeterSettings, Navigator,
    PageState, PreJoinPage, SimulatedMedia,
};
use std::io::Write;

/// Width of the printed level bar
const METER_WIDTH: usize = 40;

/// Prints the handoff as JSON, which is what the room would be given
struct StdoutNavigator;

impl Navigator for StdoutNavigator {
    fn enter_room(&mut self, record: &HandoffRecord) {
        match serde_json::to_string_pretty(record) {
            Ok(json) => println!("Joining {}\n{}", record.destination(), json),
            Err(e) => error!("Failed to serialize handoff: {}", e),
        }
    }

    fn return_home(&mut self) {
        println!("Back to the entry screen");
    }
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    cli::init_logging(&args);

    let settings = args.apply_overrides(MeterSettings::load());
    info!("Starting prejoin for room {:?} with {:?}", args.room_id, settings);

    let runtime = tokio_runtime::build().context("Failed to create Tokio runtime")?;

    if args.pipewire {
        return run_pipewire(&runtime, &args, settings);
    }

    let media =
        SimulatedMedia::with_demo_devices().with_spectrum(settings.fft_size, settings.smoothing);
    runtime.block_on(run(&args, media.clone(), media, settings))
}

#[cfg(feature = "pipewire")]
fn run_pipewire(
    runtime: &tokio::runtime::Runtime,
    args: &cli::Args,
    settings: MeterSettings,
) -> Result<()> {
    let media = prejoin::media::PipeWireMedia::connect(settings.fft_size, settings.smoothing)
        .context("Failed to connect to PipeWire")?;
    runtime.block_on(run(args, media.clone(), media, settings))
}

#[cfg(not(feature = "pipewire"))]
fn run_pipewire(
    _runtime: &tokio::runtime::Runtime,
    _args: &cli::Args,
    _settings: MeterSettings,
) -> Result<()> {
    anyhow::bail!("This build has no PipeWire support; rebuild with `--features pipewire`")
}

async fn run<C: MediaCapture, A: FrequencyAnalysis>(
    args: &cli::Args,
    capture: C,
    analysis: A,
    settings: MeterSettings,
) -> Result<()> {
    let mut page = PreJoinPage::new(&args.room_id, capture, analysis, StdoutNavigator, settings);

    if let Err(e) = page.mount().await {
        if page.state() == PageState::Idle {
            return Err(e).context("Device setup failed");
        }
        warn!("Preview unavailable: {}", e);
    }
    print_devices(&page);

    let picks = [
        (DeviceKind::AudioInput, &args.audio),
        (DeviceKind::VideoInput, &args.video),
    ];
    for (kind, wanted) in picks {
        if let Some(device_id) = wanted {
            if let Err(e) = page.select_device(kind, device_id).await {
                warn!("Keeping previous {}: {}", kind.display_name(), e);
            }
        }
    }
    if args.mute_audio {
        page.set_enabled(DeviceKind::AudioInput, false)?;
    }
    if args.mute_video {
        page.set_enabled(DeviceKind::VideoInput, false)?;
    }

    show_meter(&page, args.frames).await?;

    if args.back {
        page.back()?;
        return Ok(());
    }
    match page.join() {
        Ok(_) => Ok(()),
        Err(e) => {
            // Nothing is previewing, so there is nothing to join with
            page.back()?;
            Err(e).context("Cannot join the room")
        }
    }
}

fn print_devices<C: MediaCapture, A: FrequencyAnalysis, N: Navigator>(page: &PreJoinPage<C, A, N>) {
    for &kind in DeviceKind::all() {
        println!("{}s:", kind.display_name());
        for device in page.catalog().devices(kind) {
            let marker = if page.selection().device_id(kind) == device.id {
                '*'
            } else {
                ' '
            };
            println!("  {} {} ({})", marker, device.display_label(), device.id);
        }
    }
    if let Some(track) = page.preview_track() {
        println!("Previewing camera {}", track.device_id());
    }
}

async fn show_meter<C: MediaCapture, A: FrequencyAnalysis, N: Navigator>(
    page: &PreJoinPage<C, A, N>,
    frames: usize,
) -> Result<()> {
    let Some(mut samples) = page.level_samples() else {
        info!("No level monitor running");
        return Ok(());
    };

    let mut stdout = std::io::stdout();
    for _ in 0..frames {
        let Some(level) = samples.next().await else {
            break;
        };
        let filled = (level / MAX_LEVEL * METER_WIDTH as f32).round() as usize;
        write!(
            stdout,
            "\rLevel [{:<width$}] {:5.1}",
            "#".repeat(filled.min(METER_WIDTH)),
            level,
            width = METER_WIDTH
        )?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
