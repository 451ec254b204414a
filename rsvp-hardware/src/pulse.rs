use std::time::Duration;

use rsvp_core::PulseCode;
use rsvp_timing::Timer;
use tracing::{debug, info, warn};

use crate::status::{HardwareError, HardwareStatus};

/// Hold time between writing a code and writing `value_reset`.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(40);

const SIGNATURE_REPEATS: usize = 3;
const SIGNATURE_ON_HOLD: Duration = Duration::from_millis(50);
const SIGNATURE_OFF_HOLD: Duration = Duration::from_millis(450);

/// An 8-bit digital output port.
pub trait DigitalOutput {
    fn name(&self) -> String;

    fn write(&mut self, value: u8) -> Result<(), HardwareError>;

    fn close(&mut self) {}
}

/// Best-effort event marker channel.
///
/// With no output every call returns `false` at once; writes are never
/// retried, a failed pulse is reported and skipped.
pub struct PulseChannel<T: Timer> {
    output: Option<Box<dyn DigitalOutput>>,
    timer: T,
    settle: Duration,
    status: HardwareStatus,
}

impl<T: Timer> PulseChannel<T> {
    pub fn new(
        output: Result<Box<dyn DigitalOutput>, HardwareError>,
        timer: T,
        settle: Duration,
    ) -> Self {
        match output {
            Ok(output) => {
                let status = HardwareStatus::available(output.name());
                info!(device = %output.name(), "pulse output ready");
                Self {
                    output: Some(output),
                    timer,
                    settle,
                    status,
                }
            }
            Err(err) => {
                warn!("pulse generation disabled: {err}");
                Self {
                    output: None,
                    timer,
                    settle,
                    status: HardwareStatus::unavailable(err),
                }
            }
        }
    }

    /// Channel for runs configured without pulses.
    pub fn disabled(timer: T) -> Self {
        Self {
            output: None,
            timer,
            settle: DEFAULT_SETTLE,
            status: HardwareStatus::unavailable("pulses disabled"),
        }
    }

    pub fn status(&self) -> &HardwareStatus {
        &self.status
    }

    pub fn is_available(&self) -> bool {
        self.output.is_some()
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Writes `code`, holds for the settle time, then writes `value_reset`.
    pub fn emit(&mut self, code: u8) -> bool {
        let Some(output) = self.output.as_mut() else {
            return false;
        };
        if let Err(err) = output.write(code) {
            debug!(code, marker = ?PulseCode::from_value(code), "pulse write failed: {err}");
            return false;
        }
        self.timer.sleep(self.settle);
        if let Err(err) = output.write(PulseCode::ValueReset.value()) {
            debug!(code, "pulse reset failed: {err}");
            return false;
        }
        true
    }

    pub fn emit_code(&mut self, code: PulseCode) -> bool {
        self.emit(code.value())
    }

    /// Session start marker: three on/off pairs.
    pub fn emit_signature(&mut self) -> bool {
        let Some(output) = self.output.as_mut() else {
            return false;
        };
        for _ in 0..SIGNATURE_REPEATS {
            if let Err(err) = output.write(PulseCode::DataSignatureOn.value()) {
                debug!("signature write failed: {err}");
                return false;
            }
            self.timer.sleep(SIGNATURE_ON_HOLD);
            if let Err(err) = output.write(PulseCode::DataSignatureOff.value()) {
                debug!("signature write failed: {err}");
                return false;
            }
            self.timer.sleep(SIGNATURE_OFF_HOLD);
        }
        true
    }

    /// Drives the port low and closes it.
    pub fn release(&mut self) {
        if let Some(mut output) = self.output.take() {
            if let Err(err) = output.write(PulseCode::ValueReset.value()) {
                debug!("final reset failed: {err}");
            }
            output.close();
            debug!("pulse output released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::RecordingOutput;
    use rsvp_timing::{HighPrecisionTimer, SimulatedClock};
    use std::time::Instant;

    #[test]
    fn emit_writes_code_then_reset_after_settle() {
        let clock = SimulatedClock::new();
        let output = RecordingOutput::new(clock.clone());
        let log = output.log();
        let mut channel = PulseChannel::new(Ok(Box::new(output)), clock.clone(), DEFAULT_SETTLE);

        assert!(channel.emit_code(PulseCode::BlankOn));
        let writes = log.lock().unwrap().clone();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1, 69);
        assert_eq!(writes[1].1, 0);
        assert!((writes[1].0 - writes[0].0 - 0.040).abs() < 1e-9);
    }

    #[test]
    fn signature_is_three_on_off_pairs() {
        let clock = SimulatedClock::new();
        let output = RecordingOutput::new(clock.clone());
        let log = output.log();
        let mut channel = PulseChannel::new(Ok(Box::new(output)), clock.clone(), DEFAULT_SETTLE);

        assert!(channel.emit_signature());
        let values: Vec<u8> = log.lock().unwrap().iter().map(|w| w.1).collect();
        assert_eq!(values, vec![85, 84, 85, 84, 85, 84]);
        assert!((clock.now() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn unavailable_returns_false_without_delay() {
        let timer = HighPrecisionTimer::new();
        let mut channel = PulseChannel::new(
            Err(HardwareError::NotFound("DAQ device")),
            timer,
            DEFAULT_SETTLE,
        );
        assert!(!channel.is_available());

        let start = Instant::now();
        let sent = channel.emit(17);
        let signature = channel.emit_signature();
        let elapsed = start.elapsed();

        assert!(!sent);
        assert!(!signature);
        assert!(elapsed < Duration::from_millis(1));
        assert!(matches!(
            channel.status(),
            HardwareStatus::Unavailable { .. }
        ));
    }

    #[test]
    fn failed_write_is_not_retried() {
        let clock = SimulatedClock::new();
        let output = RecordingOutput::new(clock.clone()).failing();
        let mut channel = PulseChannel::new(Ok(Box::new(output)), clock.clone(), DEFAULT_SETTLE);
        assert!(!channel.emit(5));
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn release_resets_and_closes() {
        let clock = SimulatedClock::new();
        let output = RecordingOutput::new(clock.clone());
        let (log, closed) = (output.log(), output.closed_flag());
        let mut channel = PulseChannel::new(Ok(Box::new(output)), clock, DEFAULT_SETTLE);

        channel.release();
        assert_eq!(log.lock().unwrap().last().map(|w| w.1), Some(0));
        assert!(*closed.lock().unwrap());
        assert!(!channel.emit(1));
    }
}
