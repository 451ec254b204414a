use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rsvp_core::{Frame, PresentationFailure, ResponseSignal, SequencePlan};
use rsvp_hardware::{KeySource, ScreeningBattery};
use rsvp_timing::{Timer, TimingSource};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::devices::Devices;
use crate::error::ExperimentError;
use crate::messages;
use crate::record::{HardwareReport, ParticipantInfo, RecordSink, RunOutcome, RunRecord};
use crate::runner::{SequenceOutcome, SequenceRunner, draw_lead_blank};
use crate::summary::Summary;

/// Runs a whole session: ready and instruction screens, optional screening,
/// signature pulses, every planned sequence, summary and persistence.
pub struct Session<'c, R: Rng> {
    config: &'c Config,
    participant: ParticipantInfo,
    plans: Vec<SequencePlan>,
    image_names: Vec<String>,
    rng: R,
    screening: ScreeningBattery,
}

impl<'c, R: Rng> Session<'c, R> {
    pub fn new(
        config: &'c Config,
        participant: ParticipantInfo,
        plans: Vec<SequencePlan>,
        image_names: Vec<String>,
        rng: R,
    ) -> Self {
        let screening = ScreeningBattery {
            poll_interval: config.poll_interval(),
            ..ScreeningBattery::default()
        };
        Self {
            config,
            participant,
            plans,
            image_names,
            rng,
            screening,
        }
    }

    pub fn with_screening(mut self, battery: ScreeningBattery) -> Self {
        self.screening = battery;
        self
    }

    /// Presents the session and hands the record to `sink`.
    ///
    /// Cancellation and presentation failures end the session early but still
    /// persist what was captured. Devices are released on every path.
    pub fn run<D, K, T, S>(
        &mut self,
        devices: &mut Devices<D, K, T>,
        sink: &mut S,
    ) -> Result<RunRecord, ExperimentError>
    where
        D: TimingSource,
        K: KeySource,
        T: Timer,
        S: RecordSink + ?Sized,
    {
        let hardware = HardwareReport {
            inter_frame_interval: devices.display.inter_frame_interval(),
            response: devices.responses.status().clone(),
            pulses: devices.pulses.status().clone(),
            screening: None,
        };
        for warning in [hardware.response.warning(), hardware.pulses.warning()]
            .into_iter()
            .flatten()
        {
            warn!("{warning}");
        }
        let mut record = RunRecord {
            participant: self.participant.clone(),
            config: self.config.clone(),
            started_at: Utc::now(),
            finished_at: None,
            image_names: self.image_names.clone(),
            plans: self.plans.clone(),
            hardware,
            sequences: Vec::new(),
            sequences_completed: 0,
            outcome: RunOutcome::Completed,
            summary: Summary::default(),
        };

        record.outcome = match self.present(devices, &mut record) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("presentation failed: {err}");
                RunOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };
        record.summary = Summary::from_responses(record.responses());
        record.finished_at = Some(Utc::now());
        info!(
            outcome = ?record.outcome,
            sequences = record.sequences_completed,
            responses = record.summary.total_responses,
            "session finished"
        );

        let persisted = sink.persist(&record);
        if let Err(err) = &persisted {
            error!("{err}");
        }

        if !matches!(record.outcome, RunOutcome::Failed { .. }) {
            let text = messages::completion(self.config.language, &record.summary);
            if let Err(err) = wait_for_signal(devices, &text, self.config.poll_interval()) {
                warn!("completion screen failed: {err}");
            }
        }

        devices.release();
        persisted.map(|()| record)
    }

    fn present<D, K, T>(
        &mut self,
        devices: &mut Devices<D, K, T>,
        record: &mut RunRecord,
    ) -> Result<RunOutcome, PresentationFailure>
    where
        D: TimingSource,
        K: KeySource,
        T: Timer,
    {
        let language = self.config.language;
        let poll = self.config.poll_interval();
        let cancelled = |during: &str| {
            warn!(during, "session cancelled");
            RunOutcome::Cancelled {
                during: during.to_string(),
            }
        };

        if wait_for_signal(devices, messages::ready_begin(language), poll)? != ResponseSignal::Respond
        {
            return Ok(cancelled("ready screen"));
        }

        if self.config.enable_screening {
            info!("running screening battery");
            let report = self.screening.run(
                &mut devices.display,
                &mut devices.responses,
                &mut devices.pulses,
                &devices.timer,
            )?;
            let aborted = report.cancelled;
            record.hardware.screening = Some(report);
            if aborted {
                return Ok(cancelled("screening"));
            }
        }

        let instructions = messages::instructions(language, devices.responses.device_name());
        if wait_for_signal(devices, &instructions, poll)? != ResponseSignal::Respond {
            return Ok(cancelled("instructions"));
        }

        if devices.pulses.is_available() {
            info!("sending signature pulses");
            if !devices.pulses.emit_signature() {
                warn!("signature pulses not delivered");
            }
        }

        for plan in &self.plans {
            let before = format!("ready screen before sequence {}", plan.sequence_number);
            if wait_for_signal(devices, messages::ready_continue(language), poll)?
                != ResponseSignal::Respond
            {
                return Ok(cancelled(&before));
            }

            let lead = draw_lead_blank(
                self.config.min_blank_duration,
                self.config.max_rand_blank,
                &mut self.rng,
            );
            let mut runner = SequenceRunner::new(plan, lead, poll);
            let result = runner.run(devices);
            record.sequences.push(runner.into_record());
            match result? {
                SequenceOutcome::Completed => record.sequences_completed += 1,
                SequenceOutcome::Cancelled => {
                    return Ok(cancelled(&format!("sequence {}", plan.sequence_number)));
                }
            }
        }
        Ok(RunOutcome::Completed)
    }
}

/// Shows `text` and polls until the participant responds or cancels.
fn wait_for_signal<D, K, T>(
    devices: &mut Devices<D, K, T>,
    text: &str,
    poll: Duration,
) -> Result<ResponseSignal, PresentationFailure>
where
    D: TimingSource,
    K: KeySource,
    T: Timer,
{
    devices.display.draw(&Frame::message(text))?;
    devices.display.present(None)?;
    devices.responses.reset_edges();
    loop {
        match devices.responses.poll() {
            ResponseSignal::None => devices.timer.sleep(poll),
            signal => return Ok(signal),
        }
    }
}
