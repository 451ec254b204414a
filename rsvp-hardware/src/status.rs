use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure talking to a peripheral. Never crosses a channel boundary as an
/// error: channels turn it into a [`HardwareStatus`] and keep going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HardwareError {
    #[error("no {0} detected")]
    NotFound(&'static str),
    #[error("{0} support was not compiled in")]
    NotCompiled(&'static str),
    #[error("device error: {0}")]
    Device(String),
    #[error("unknown digital port `{0}`")]
    UnknownPort(String),
}

/// Outcome of acquiring a hardware channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HardwareStatus {
    /// The requested device is open and in use.
    Available { device: String },
    /// Not requested, or requested and absent; the channel is a no-op.
    Unavailable { reason: String },
    /// Requested and absent, but the channel still works through a fallback.
    Degraded { reason: String },
}

impl HardwareStatus {
    pub fn available(device: impl Into<String>) -> Self {
        HardwareStatus::Available {
            device: device.into(),
        }
    }

    pub fn unavailable(reason: impl ToString) -> Self {
        HardwareStatus::Unavailable {
            reason: reason.to_string(),
        }
    }

    pub fn degraded(reason: impl ToString) -> Self {
        HardwareStatus::Degraded {
            reason: reason.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, HardwareStatus::Available { .. })
    }

    /// Warning text to surface to the operator, if any.
    pub fn warning(&self) -> Option<&str> {
        match self {
            HardwareStatus::Available { .. } => None,
            HardwareStatus::Unavailable { reason } | HardwareStatus::Degraded { reason } => {
                Some(reason)
            }
        }
    }
}
