use chrono::{DateTime, Utc};
use rsvp_core::{ResponseEvent, SequencePlan, TimingSample};
use rsvp_hardware::HardwareStatus;
use rsvp_hardware::screening::ScreeningReport;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ExperimentError;
use crate::runner::SequenceRecord;
use crate::summary::Summary;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub participant_id: String,
    pub session: u32,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub handedness: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// Escape was pressed; `during` names the screen or sequence.
    Cancelled { during: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareReport {
    pub inter_frame_interval: f64,
    pub response: HardwareStatus,
    pub pulses: HardwareStatus,
    pub screening: Option<ScreeningReport>,
}

/// Everything a run produced, handed to a [`RecordSink`] once at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub participant: ParticipantInfo,
    pub config: Config,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub image_names: Vec<String>,
    pub plans: Vec<SequencePlan>,
    pub hardware: HardwareReport,
    pub sequences: Vec<SequenceRecord>,
    /// Sequences that ran to `Done`; a cancelled or failed one is still in
    /// `sequences` with its partial data.
    pub sequences_completed: usize,
    pub outcome: RunOutcome,
    pub summary: Summary,
}

impl RunRecord {
    pub fn responses(&self) -> impl Iterator<Item = &ResponseEvent> {
        self.sequences.iter().flat_map(|s| s.responses.iter())
    }

    pub fn samples(&self) -> impl Iterator<Item = &TimingSample> {
        self.sequences.iter().flat_map(|s| s.samples.iter())
    }

    pub fn response_clock(&self) -> impl Iterator<Item = f64> + '_ {
        self.sequences
            .iter()
            .flat_map(|s| s.response_clock.iter().copied())
    }
}

/// Persistence collaborator; the engine itself never touches the filesystem.
pub trait RecordSink {
    fn persist(&mut self, record: &RunRecord) -> Result<(), ExperimentError>;
}

/// Keeps every persisted record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<RunRecord>,
}

impl RecordSink for MemorySink {
    fn persist(&mut self, record: &RunRecord) -> Result<(), ExperimentError> {
        self.records.push(record.clone());
        Ok(())
    }
}
