//! Pre-session hardware check: display colors, flip timing, gamepad and
//! pulse output, each visible to the operator.

use std::time::Duration;

use rsvp_core::{Frame, PresentationFailure, ResponseSignal};
use rsvp_timing::{FrameIntervalMonitor, Timer, TimingSource};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pulse::PulseChannel;
use crate::response::{KeySource, ResponseChannel};

const SWEEP_COLORS: [[u8; 3]; 6] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 255],
    [128, 128, 128],
    [0, 0, 0],
];

pub const PULSE_TEST_VALUES: [u8; 13] = [1, 2, 5, 8, 17, 32, 65, 128, 85, 84, 4, 16, 0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipTiming {
    pub flips: usize,
    pub mean_interval: f64,
    pub std_interval: f64,
    pub refresh_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamepadCheck {
    Pressed,
    TimedOut,
    NoDevice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub colors_shown: usize,
    pub flip_timing: Option<FlipTiming>,
    pub gamepad: Option<GamepadCheck>,
    /// `(value, written)` for every pulse test value.
    pub pulses: Vec<(u8, bool)>,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct ScreeningBattery {
    pub color_hold: Duration,
    pub timing_flips: usize,
    pub gamepad_timeout: Duration,
    pub pulse_spacing: Duration,
    pub poll_interval: Duration,
}

impl Default for ScreeningBattery {
    fn default() -> Self {
        Self {
            color_hold: Duration::from_millis(500),
            timing_flips: 60,
            gamepad_timeout: Duration::from_secs(10),
            pulse_spacing: Duration::from_millis(400),
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl ScreeningBattery {
    /// Runs every check in order. Escape during the gamepad check cancels the
    /// remaining checks; only display errors are returned.
    pub fn run<D, K, T>(
        &self,
        display: &mut D,
        responses: &mut ResponseChannel<K>,
        pulses: &mut PulseChannel<T>,
        timer: &T,
    ) -> Result<ScreeningReport, PresentationFailure>
    where
        D: TimingSource,
        K: KeySource,
        T: Timer,
    {
        let mut report = ScreeningReport {
            colors_shown: 0,
            flip_timing: None,
            gamepad: None,
            pulses: Vec::new(),
            cancelled: false,
        };

        info!("screening: display colors");
        for rgb in SWEEP_COLORS {
            display.draw(&Frame::Solid { rgb })?;
            display.present(None)?;
            timer.sleep(self.color_hold);
            report.colors_shown += 1;
        }

        info!("screening: flip timing");
        report.flip_timing = Some(self.flip_timing(display)?);

        info!("screening: gamepad");
        let gamepad = self.gamepad_check(display, responses, timer)?;
        report.gamepad = gamepad;
        if gamepad.is_none() {
            report.cancelled = true;
            warn!("screening cancelled");
            return Ok(report);
        }

        info!("screening: pulses");
        display.draw(&Frame::message("Sending test pulses"))?;
        display.present(None)?;
        for value in PULSE_TEST_VALUES {
            let written = pulses.emit(value);
            report.pulses.push((value, written));
            timer.sleep(self.pulse_spacing.saturating_sub(pulses.settle()));
        }
        if !pulses.is_available() {
            warn!("pulse test skipped: {:?}", pulses.status());
        }

        display.draw(&Frame::Blank)?;
        display.present(None)?;
        Ok(report)
    }

    fn flip_timing<D: TimingSource>(
        &self,
        display: &mut D,
    ) -> Result<FlipTiming, PresentationFailure> {
        let mut monitor = FrameIntervalMonitor::new(self.timing_flips.max(1));
        for i in 0..=self.timing_flips {
            let rgb = if i % 2 == 0 { [0, 0, 0] } else { [255, 255, 255] };
            display.draw(&Frame::Solid { rgb })?;
            monitor.record_present(display.present(None)?);
        }
        let stats = monitor.calibration_stats();
        info!(
            mean_ms = stats.average_frame_time * 1000.0,
            std_ms = stats.jitter * 1000.0,
            refresh_hz = stats.effective_fps,
            "flip timing"
        );
        Ok(FlipTiming {
            flips: stats.samples,
            mean_interval: stats.average_frame_time,
            std_interval: stats.jitter,
            refresh_rate: stats.effective_fps,
        })
    }

    /// `None` when the operator cancelled.
    fn gamepad_check<D, K, T>(
        &self,
        display: &mut D,
        responses: &mut ResponseChannel<K>,
        timer: &T,
    ) -> Result<Option<GamepadCheck>, PresentationFailure>
    where
        D: TimingSource,
        K: KeySource,
        T: Timer,
    {
        let Some(name) = responses.device_name().map(str::to_string) else {
            return Ok(Some(GamepadCheck::NoDevice));
        };
        display.draw(&Frame::message(format!("Press a button on {name}")))?;
        display.present(None)?;

        responses.reset_edges();
        let deadline = timer.now() + self.gamepad_timeout.as_secs_f64();
        while timer.now() < deadline {
            match responses.poll() {
                ResponseSignal::Respond => return Ok(Some(GamepadCheck::Pressed)),
                ResponseSignal::Cancel => return Ok(None),
                ResponseSignal::None => timer.sleep(self.poll_interval),
            }
        }
        warn!(gamepad = %name, "no button press before timeout");
        Ok(Some(GamepadCheck::TimedOut))
    }
}
