mod display;
mod images;
mod keyboard;
mod persist;
mod window;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rsvp_experiment::{
    generate_plans, Config, DeviceResponse, Devices, ParticipantInfo, RunOutcome, Session,
};
use rsvp_hardware::daq::open_daq;
use rsvp_hardware::gamepad::open_gamepad;
use rsvp_hardware::{PulseChannel, ResponseChannel};
use rsvp_render::SkiaRenderer;
use rsvp_timing::HighPrecisionTimer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::display::PixelsDisplay;
use crate::keyboard::WinitKeys;
use crate::persist::JsonSink;
use crate::window::{WindowHost, WindowSettings};

/// Tried in order when no `--font` is given.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];
const FONT_SIZE_FRACTION: f32 = 0.04;

#[derive(Debug, Parser)]
#[command(name = "rsvp", version, about = "Frame-locked rapid serial visual presentation")]
struct Cli {
    /// JSON configuration; built-in defaults when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides `pictures_path` from the configuration.
    #[arg(long, value_name = "DIR")]
    pictures: Option<PathBuf>,

    #[arg(short, long, default_value = "anonymous")]
    participant: String,

    #[arg(short, long, default_value_t = 1)]
    session: u32,

    #[arg(long)]
    age: Option<u32>,

    #[arg(long)]
    gender: Option<String>,

    #[arg(long)]
    handedness: Option<String>,

    /// Directory receiving the run record.
    #[arg(short, long, default_value = "experiment_data", value_name = "DIR")]
    output: PathBuf,

    /// TrueType/OpenType font for on-screen messages.
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// Seed for sequence generation and blank durations.
    #[arg(long)]
    seed: Option<u64>,

    /// Writes the default configuration to FILE and exits.
    #[arg(long, value_name = "FILE")]
    write_default_config: Option<PathBuf>,
}

impl Cli {
    fn participant(&self) -> ParticipantInfo {
        ParticipantInfo {
            participant_id: self.participant.clone(),
            session: self.session,
            age: self.age,
            gender: self.gender.clone(),
            handedness: self.handedness.clone(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    Registry::default().with(filter).with(fmt_layer).init();
}

/// Raises the Windows scheduler tick to 1 ms for the lifetime of the guard.
struct TimerResolution;

impl TimerResolution {
    fn raise() -> Self {
        #[cfg(windows)]
        unsafe {
            windows::Win32::Media::timeBeginPeriod(1);
        }
        TimerResolution
    }
}

impl Drop for TimerResolution {
    fn drop(&mut self) {
        #[cfg(windows)]
        unsafe {
            windows::Win32::Media::timeEndPeriod(1);
        }
    }
}

fn load_font(cli: &Cli) -> Result<Option<Vec<u8>>> {
    if let Some(path) = &cli.font {
        let bytes =
            std::fs::read(path).with_context(|| format!("cannot read font {}", path.display()))?;
        return Ok(Some(bytes));
    }
    Ok(SYSTEM_FONTS.iter().find_map(|path| std::fs::read(path).ok()))
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Some(path) = &cli.write_default_config {
        Config::default()
            .save(path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        info!(path = %path.display(), "default configuration written");
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(pictures) = &cli.pictures {
        config.pictures_path = pictures.clone();
    }
    config.validate()?;

    info!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);

    let paths = images::list_images(&config.pictures_path)?;
    let seed = cli.seed.unwrap_or_else(|| rand::rng().random());
    info!(seed, "random seed");
    let mut rng = StdRng::seed_from_u64(seed);
    let plans = generate_plans(
        paths.len(),
        config.seq_length,
        config.n_sequences,
        &config.isi,
        &mut rng,
    )?;
    let stimuli = images::load_images(&paths)?;
    let image_names: Vec<String> = stimuli.iter().map(|s| s.name.clone()).collect();

    let _resolution = TimerResolution::raise();
    let host = WindowHost::open(WindowSettings {
        title: "RSVP".to_string(),
        size: config.window_resolution,
        fullscreen: config.fullscreen,
    })?;
    let size = host
        .borrow()
        .inner_size()
        .context("window has no size")?;

    let mut renderer = SkiaRenderer::new(size.width, size.height)?;
    match load_font(&cli)? {
        Some(bytes) => {
            let font_size = (size.height as f32 * FONT_SIZE_FRACTION).max(16.0);
            renderer = renderer.with_font(bytes, font_size)?;
        }
        None => warn!("no font found, messages will not be drawn; pass --font"),
    }
    for stimulus in &stimuli {
        let (w, h) = stimulus.pixels.dimensions();
        renderer.add_image(w, h, stimulus.pixels.as_raw())?;
    }
    drop(stimuli);

    let timer = HighPrecisionTimer::new();
    let display = PixelsDisplay::open(host.clone(), renderer, timer)?;
    let keys = WinitKeys::new(host);
    let responses = match config.device_response {
        DeviceResponse::Gamepad => {
            ResponseChannel::with_device(keys, open_gamepad(), &config.gamepad_buttons)
        }
        DeviceResponse::Keyboard => ResponseChannel::keyboard_only(keys),
    };
    let pulses = if config.withpulses {
        PulseChannel::new(
            open_daq(&config.daq_device, &config.daq_port),
            timer,
            config.pulse_settle(),
        )
    } else {
        PulseChannel::disabled(timer)
    };
    let mut devices = Devices::new(display, responses, pulses, timer);

    let mut sink = JsonSink::new(cli.output.clone());
    let mut session = Session::new(&config, cli.participant(), plans, image_names, rng);
    let record = session.run(&mut devices, &mut sink)?;

    match &record.outcome {
        RunOutcome::Completed => info!(
            responses = record.summary.total_responses,
            saved = ?sink.written().last(),
            "experiment completed"
        ),
        RunOutcome::Cancelled { during } => warn!(during = %during, "experiment cancelled"),
        RunOutcome::Failed { reason } => {
            error!("experiment failed: {reason}");
            bail!("presentation failed: {reason}");
        }
    }
    Ok(())
}
