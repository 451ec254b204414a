use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sequence worth of stimuli, fixed before presentation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencePlan {
    pub sequence_number: usize,
    pub image_indices: Vec<usize>,
    pub isi: f64,
}

impl SequencePlan {
    pub fn len(&self) -> usize {
        self.image_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_indices.is_empty()
    }
}

/// What a presented frame showed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameKind {
    BlankLead,
    /// `position` is 1-based within the sequence.
    Image { position: usize, image_index: usize },
    BlankTrail,
}

/// Realized presentation timestamp of one frame, on the monotonic timer clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingSample {
    pub sequence_number: usize,
    pub frame: FrameKind,
    /// Absolute time the engine targeted, `None` for as-soon-as-possible presents.
    pub nominal_time: Option<f64>,
    pub realized_time: f64,
}

impl TimingSample {
    /// Signed distance between realized and nominal onset, in seconds.
    pub fn onset_error(&self) -> Option<f64> {
        self.nominal_time.map(|nominal| self.realized_time - nominal)
    }
}

/// A participant response recorded inside an ISI window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub sequence_number: usize,
    pub image_position: usize,
    pub reaction_time: f64,
    pub correct: bool,
    pub timestamp: DateTime<Utc>,
}
