use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rsvp_core::{
    Frame, FrameKind, PresentationFailure, PulseCode, ResponseEvent, ResponseSignal, SequencePlan,
    SequenceState, TimingSample,
};
use rsvp_hardware::KeySource;
use rsvp_timing::{Timer, TimingSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::devices::Devices;

/// Lead blank duration `min_blank + U[0, 1) * max_rand_blank`, reused as the
/// trail hold of the same sequence.
pub fn draw_lead_blank<R: Rng>(min_blank: f64, max_rand_blank: f64, rng: &mut R) -> f64 {
    min_blank + rng.random::<f64>() * max_rand_blank
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceOutcome {
    Completed,
    Cancelled,
}

/// Everything observed while one plan was presented.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub sequence_number: usize,
    pub isi: f64,
    pub lead_blank: f64,
    /// One entry per presented frame, strictly increasing.
    pub samples: Vec<TimingSample>,
    pub responses: Vec<ResponseEvent>,
    /// Raw timer reads taken when responses were recorded. Kept apart from
    /// `samples`, which only hold frame onsets.
    pub response_clock: Vec<f64>,
    pub failed_pulses: usize,
}

/// Drives one [`SequencePlan`] through its [`SequenceState`]s.
///
/// Each [`step`](Self::step) executes the current state against the devices
/// and moves to the next one. Presents are the only blocking calls; between
/// them the runner polls the response channel every `poll_interval`.
pub struct SequenceRunner<'p> {
    plan: &'p SequencePlan,
    poll_interval: Duration,
    lead: f64,
    state: SequenceState,
    previous_onset: f64,
    record: SequenceRecord,
}

impl<'p> SequenceRunner<'p> {
    pub fn new(plan: &'p SequencePlan, lead_blank: f64, poll_interval: Duration) -> Self {
        Self {
            plan,
            poll_interval,
            lead: lead_blank,
            state: SequenceState::default(),
            previous_onset: 0.0,
            record: SequenceRecord {
                sequence_number: plan.sequence_number,
                isi: plan.isi,
                lead_blank,
                ..SequenceRecord::default()
            },
        }
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn record(&self) -> &SequenceRecord {
        &self.record
    }

    pub fn into_record(self) -> SequenceRecord {
        self.record
    }

    /// Steps until `Done` or `Cancelled`. On a presentation failure the
    /// record keeps everything captured before it.
    pub fn run<D, K, T>(
        &mut self,
        devices: &mut Devices<D, K, T>,
    ) -> Result<SequenceOutcome, PresentationFailure>
    where
        D: TimingSource,
        K: KeySource,
        T: Timer,
    {
        while !self.state.is_terminal() {
            self.step(devices)?;
        }
        let outcome = if self.state == SequenceState::Cancelled {
            SequenceOutcome::Cancelled
        } else {
            SequenceOutcome::Completed
        };
        info!(
            sequence = self.plan.sequence_number,
            responses = self.record.responses.len(),
            ?outcome,
            "sequence finished"
        );
        Ok(outcome)
    }

    pub fn step<D, K, T>(
        &mut self,
        devices: &mut Devices<D, K, T>,
    ) -> Result<SequenceState, PresentationFailure>
    where
        D: TimingSource,
        K: KeySource,
        T: Timer,
    {
        let slack = devices.display.slack();
        let len = self.plan.len();
        let next = match self.state {
            SequenceState::BlankLead => {
                info!(
                    sequence = self.plan.sequence_number,
                    images = len,
                    isi = self.plan.isi,
                    lead = self.lead,
                    "sequence started"
                );
                devices.responses.reset_edges();
                self.present(devices, Frame::Blank, FrameKind::BlankLead, None)?;
                self.pulse(devices, PulseCode::BlankOn);
                // Stop one frame early so polling never delays the first image.
                let first_target = self.previous_onset + self.lead - slack;
                let until = first_target - devices.display.inter_frame_interval();
                let cancelled = self.poll_window(devices, until, None);
                self.after_poll(cancelled, len)
            }
            SequenceState::Image(i) => {
                let gap = if i == 0 { self.lead } else { self.plan.isi };
                let target = self.previous_onset + gap - slack;
                let image_index = self.plan.image_indices[i];
                self.present(
                    devices,
                    Frame::Image { index: image_index },
                    FrameKind::Image {
                        position: i + 1,
                        image_index,
                    },
                    Some(target),
                )?;
                self.pulse(devices, PulseCode::for_image_position(i));
                SequenceState::IsiWait(i)
            }
            SequenceState::IsiWait(i) => {
                let until = self.previous_onset + self.plan.isi - slack;
                let cancelled = self.poll_window(devices, until, Some(i));
                self.after_poll(cancelled, len)
            }
            SequenceState::BlankTrail => {
                let target = self.previous_onset + self.plan.isi - slack;
                self.present(devices, Frame::Blank, FrameKind::BlankTrail, Some(target))?;
                self.pulse(devices, PulseCode::BlankOn);
                let until = self.previous_onset + self.lead;
                let cancelled = self.poll_window(devices, until, None);
                self.after_poll(cancelled, len)
            }
            SequenceState::Done | SequenceState::Cancelled => return Ok(self.state),
        };
        debug!(from = ?self.state, to = ?next, "sequence transition");
        self.state = next;
        Ok(next)
    }

    fn after_poll(&self, cancelled: bool, len: usize) -> SequenceState {
        if cancelled {
            warn!(sequence = self.plan.sequence_number, state = ?self.state, "cancelled");
            SequenceState::Cancelled
        } else {
            self.state.next(len).unwrap_or(SequenceState::Done)
        }
    }

    fn present<D, K, T>(
        &mut self,
        devices: &mut Devices<D, K, T>,
        frame: Frame,
        kind: FrameKind,
        target: Option<f64>,
    ) -> Result<(), PresentationFailure>
    where
        D: TimingSource,
        K: KeySource,
        T: Timer,
    {
        debug_assert!(self.state.presents_frame());
        devices.display.draw(&frame)?;
        let realized = devices.display.present(target)?;
        let sample = TimingSample {
            sequence_number: self.plan.sequence_number,
            frame: kind,
            nominal_time: target,
            realized_time: realized,
        };
        if let Some(error) = sample.onset_error() {
            debug!(?kind, realized, error_ms = error * 1e3, "frame");
        }
        self.record.samples.push(sample);
        self.previous_onset = realized;
        Ok(())
    }

    fn pulse<D, K, T>(&mut self, devices: &mut Devices<D, K, T>, code: PulseCode)
    where
        D: TimingSource,
        K: KeySource,
        T: Timer,
    {
        if devices.pulses.is_available() && !devices.pulses.emit_code(code) {
            self.record.failed_pulses += 1;
            warn!(?code, "pulse not delivered");
        }
    }

    /// Polls until the timer reaches `until`; returns true on cancel.
    ///
    /// With `image` set, responses are recorded against that 0-based
    /// position; otherwise they are discarded.
    fn poll_window<D, K, T>(
        &mut self,
        devices: &mut Devices<D, K, T>,
        until: f64,
        image: Option<usize>,
    ) -> bool
    where
        D: TimingSource,
        K: KeySource,
        T: Timer,
    {
        debug_assert!(self.state.is_poll_point());
        let onset = self.previous_onset;
        loop {
            match devices.responses.poll() {
                ResponseSignal::Cancel => return true,
                ResponseSignal::Respond => match image {
                    Some(i) => {
                        let now = devices.timer.now();
                        let event = ResponseEvent {
                            sequence_number: self.plan.sequence_number,
                            image_position: i + 1,
                            reaction_time: (now - onset).max(0.0),
                            correct: true,
                            timestamp: Utc::now(),
                        };
                        info!(
                            image = event.image_position,
                            rt = event.reaction_time,
                            "response recorded"
                        );
                        self.record.responses.push(event);
                        self.record.response_clock.push(now);
                        self.pulse(devices, PulseCode::ResponseOffset);
                    }
                    None => debug!(state = ?self.state, "response outside an ISI window ignored"),
                },
                ResponseSignal::None => {}
            }
            let remaining = until - devices.timer.now();
            if remaining <= 1e-9 {
                return false;
            }
            devices
                .timer
                .sleep(self.poll_interval.min(Duration::from_secs_f64(remaining)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rsvp_hardware::scripted::{RecordingOutput, ScriptedButtons, ScriptedKeys};
    use rsvp_hardware::{DEFAULT_SETTLE, Key, PulseChannel, ResponseChannel};
    use rsvp_timing::{SimulatedClock, SimulatedDisplay};

    type SimDevices = Devices<SimulatedDisplay, ScriptedKeys<SimulatedClock>, SimulatedClock>;

    const POLL: Duration = Duration::from_millis(1);

    fn plan(len: usize, isi: f64) -> SequencePlan {
        SequencePlan {
            sequence_number: 1,
            image_indices: (0..len).collect(),
            isi,
        }
    }

    fn keyboard_devices(clock: &SimulatedClock, keys: ScriptedKeys<SimulatedClock>) -> SimDevices {
        Devices::new(
            SimulatedDisplay::new(clock.clone(), 100.0),
            ResponseChannel::keyboard_only(keys),
            PulseChannel::disabled(clock.clone()),
            clock.clone(),
        )
    }

    fn gamepad_devices(clock: &SimulatedClock, buttons: ScriptedButtons<SimulatedClock>) -> SimDevices {
        Devices::new(
            SimulatedDisplay::new(clock.clone(), 100.0),
            ResponseChannel::with_device(
                ScriptedKeys::new(clock.clone()),
                Ok(Box::new(buttons)),
                &[0, 1],
            ),
            PulseChannel::disabled(clock.clone()),
            clock.clone(),
        )
    }

    #[test]
    fn lead_blank_draw_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let lead = draw_lead_blank(1.25, 0.5, &mut rng);
            assert!((1.25..1.75).contains(&lead));
        }
        assert_eq!(draw_lead_blank(0.8, 0.0, &mut rng), 0.8);
    }

    #[test]
    fn completed_sequence_records_every_frame() {
        let clock = SimulatedClock::new();
        let mut devices = keyboard_devices(&clock, ScriptedKeys::new(clock.clone()));
        let plan = plan(5, 1.0);
        let mut runner = SequenceRunner::new(&plan, 0.5, POLL);

        assert_eq!(runner.run(&mut devices).unwrap(), SequenceOutcome::Completed);
        assert_eq!(runner.state(), SequenceState::Done);
        let record = runner.into_record();
        assert_eq!(record.samples.len(), plan.len() + 2);
        assert!(record.samples.windows(2).all(|w| w[0].realized_time < w[1].realized_time));
        assert_eq!(record.samples[0].frame, FrameKind::BlankLead);
        assert_eq!(record.samples[6].frame, FrameKind::BlankTrail);

        let onsets: Vec<f64> = record.samples.iter().map(|s| s.realized_time).collect();
        assert!((onsets[1] - onsets[0] - 0.5).abs() < 1e-6);
        for pair in onsets[1..].windows(2) {
            assert!((pair[1] - pair[0] - 1.0).abs() < 1e-6);
        }
        // Trail hold reuses the lead duration.
        assert!(clock.now() >= onsets[6] + 0.5 - 1e-9);
    }

    #[test]
    fn images_follow_the_plan_order() {
        let clock = SimulatedClock::new();
        let mut devices = keyboard_devices(&clock, ScriptedKeys::new(clock.clone()));
        let plan = SequencePlan {
            sequence_number: 4,
            image_indices: vec![7, 2, 9],
            isi: 0.5,
        };
        let mut runner = SequenceRunner::new(&plan, 0.3, POLL);
        runner.run(&mut devices).unwrap();

        let shown: Vec<Frame> = devices
            .display
            .presented()
            .iter()
            .map(|(frame, _)| frame.clone())
            .collect();
        assert_eq!(
            shown,
            vec![
                Frame::Blank,
                Frame::Image { index: 7 },
                Frame::Image { index: 2 },
                Frame::Image { index: 9 },
                Frame::Blank
            ]
        );
        assert!(runner.record().samples.iter().all(|s| s.sequence_number == 4));
    }

    #[test]
    fn pulse_codes_per_frame() {
        let clock = SimulatedClock::new();
        let output = RecordingOutput::new(clock.clone());
        let log = output.log();
        let mut devices = Devices::new(
            SimulatedDisplay::new(clock.clone(), 100.0),
            ResponseChannel::keyboard_only(ScriptedKeys::new(clock.clone())),
            PulseChannel::new(Ok(Box::new(output)), clock.clone(), DEFAULT_SETTLE),
            clock.clone(),
        );
        let plan = plan(4, 0.5);
        let mut runner = SequenceRunner::new(&plan, 0.6, POLL);
        runner.run(&mut devices).unwrap();

        let codes: Vec<u8> = log
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.1)
            .filter(|&v| v != 0)
            .collect();
        assert_eq!(codes, vec![69, 3, 3, 1, 3, 69]);
        assert_eq!(runner.record().failed_pulses, 0);

        // Onsets keep their schedule even though each pulse holds 40 ms.
        let onsets: Vec<f64> = runner.record().samples.iter().map(|s| s.realized_time).collect();
        for pair in onsets[1..].windows(2) {
            assert!((pair[1] - pair[0] - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn response_in_window_is_recorded_and_polling_continues() {
        let clock = SimulatedClock::new();
        // Lead blank lands at 0.01, first image at 0.51.
        let buttons = ScriptedButtons::new(clock.clone(), 2)
            .hold(0, 0.86, 0.96)
            .hold(1, 1.21, 1.30);
        let mut devices = gamepad_devices(&clock, buttons);
        let plan = plan(3, 1.0);
        let mut runner = SequenceRunner::new(&plan, 0.5, POLL);

        assert_eq!(runner.run(&mut devices).unwrap(), SequenceOutcome::Completed);
        let record = runner.record();
        assert!((record.samples[1].realized_time - 0.51).abs() < 1e-9);
        assert_eq!(record.responses.len(), 2);

        let first = &record.responses[0];
        assert_eq!(first.image_position, 1);
        assert!(first.correct);
        assert!(first.reaction_time >= 0.35 - 1e-9 && first.reaction_time < 0.352);
        assert_eq!(record.responses[1].image_position, 1);

        assert_eq!(record.response_clock.len(), 2);
        assert_eq!(record.samples.len(), 5);
    }

    #[test]
    fn response_pulse_follows_each_response() {
        let clock = SimulatedClock::new();
        let output = RecordingOutput::new(clock.clone());
        let log = output.log();
        let keys = ScriptedKeys::new(clock.clone()).press_at(0.9, Key::Space);
        let mut devices = Devices::new(
            SimulatedDisplay::new(clock.clone(), 100.0),
            ResponseChannel::keyboard_only(keys),
            PulseChannel::new(Ok(Box::new(output)), clock.clone(), DEFAULT_SETTLE),
            clock.clone(),
        );
        let plan = plan(2, 1.0);
        SequenceRunner::new(&plan, 0.5, POLL).run(&mut devices).unwrap();

        let codes: Vec<u8> = log
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.1)
            .filter(|&v| v != 0)
            .collect();
        assert_eq!(codes, vec![69, 3, 81, 3, 69]);
    }

    #[test]
    fn responses_during_blanks_are_discarded() {
        let clock = SimulatedClock::new();
        let keys = ScriptedKeys::new(clock.clone())
            .press_at(0.2, Key::Space)
            .press_at(2.7, Key::Space);
        let mut devices = keyboard_devices(&clock, keys);
        let plan = plan(2, 1.0);
        let mut runner = SequenceRunner::new(&plan, 0.5, POLL);
        runner.run(&mut devices).unwrap();
        // Trail blank lands at 2.51 and holds until 3.01.
        assert!(runner.record().responses.is_empty());
    }

    #[test]
    fn cancel_in_third_isi_window() {
        let clock = SimulatedClock::new();
        let keys = ScriptedKeys::new(clock.clone()).press_at(2.7, Key::Escape);
        let mut devices = keyboard_devices(&clock, keys);
        let plan = plan(5, 1.0);
        let mut runner = SequenceRunner::new(&plan, 0.5, POLL);

        assert_eq!(runner.run(&mut devices).unwrap(), SequenceOutcome::Cancelled);
        assert_eq!(runner.state(), SequenceState::Cancelled);
        // Lead blank plus images 1..=3.
        assert_eq!(runner.record().samples.len(), 4);
        assert!(clock.now() < 2.71);
    }

    #[test]
    fn cancel_during_lead_blank_and_trail_hold() {
        let clock = SimulatedClock::new();
        let keys = ScriptedKeys::new(clock.clone()).press_at(0.1, Key::Escape);
        let mut devices = keyboard_devices(&clock, keys);
        let plan = plan(3, 1.0);
        let mut runner = SequenceRunner::new(&plan, 0.5, POLL);
        assert_eq!(runner.run(&mut devices).unwrap(), SequenceOutcome::Cancelled);
        assert_eq!(runner.record().samples.len(), 1);

        let clock = SimulatedClock::new();
        let keys = ScriptedKeys::new(clock.clone()).press_at(3.7, Key::Escape);
        let mut devices = keyboard_devices(&clock, keys);
        let mut runner = SequenceRunner::new(&plan, 0.5, POLL);
        assert_eq!(runner.run(&mut devices).unwrap(), SequenceOutcome::Cancelled);
        assert_eq!(runner.record().samples.len(), 5);
    }

    #[test]
    fn presentation_failure_keeps_partial_record() {
        let clock = SimulatedClock::new();
        let mut devices = Devices::new(
            SimulatedDisplay::new(clock.clone(), 60.0).fail_on_present(3),
            ResponseChannel::keyboard_only(ScriptedKeys::new(clock.clone())),
            PulseChannel::disabled(clock.clone()),
            clock.clone(),
        );
        let plan = plan(5, 0.5);
        let mut runner = SequenceRunner::new(&plan, 0.5, POLL);
        assert!(matches!(
            runner.run(&mut devices),
            Err(PresentationFailure::SurfaceLost(_))
        ));
        assert_eq!(runner.state(), SequenceState::Image(2));
        assert_eq!(runner.record().samples.len(), 3);
    }

    #[test]
    fn held_button_from_previous_sequence_is_ignored() {
        let clock = SimulatedClock::new();
        // Held through the start of the second sequence.
        let buttons = ScriptedButtons::new(clock.clone(), 2).hold(0, 1.0, 2.5);
        let mut devices = gamepad_devices(&clock, buttons);
        let first = plan(1, 1.0);
        let mut runner = SequenceRunner::new(&first, 0.5, POLL);
        runner.run(&mut devices).unwrap();
        assert_eq!(runner.record().responses.len(), 1);

        let second = SequencePlan {
            sequence_number: 2,
            ..plan(1, 1.0)
        };
        let mut runner = SequenceRunner::new(&second, 0.5, POLL);
        runner.run(&mut devices).unwrap();
        assert!(runner.record().responses.is_empty());
    }
}
