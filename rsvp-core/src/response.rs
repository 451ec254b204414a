use serde::{Deserialize, Serialize};

/// Outcome of one non-blocking poll of the response channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseSignal {
    #[default]
    None,
    Respond,
    Cancel,
}

impl ResponseSignal {
    /// Combines two signals observed within the same poll; cancel dominates.
    pub fn merge(self, other: ResponseSignal) -> ResponseSignal {
        match (self, other) {
            (ResponseSignal::Cancel, _) | (_, ResponseSignal::Cancel) => ResponseSignal::Cancel,
            (ResponseSignal::Respond, _) | (_, ResponseSignal::Respond) => ResponseSignal::Respond,
            _ => ResponseSignal::None,
        }
    }
}
