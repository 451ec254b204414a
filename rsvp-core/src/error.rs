use thiserror::Error;

/// Invalid run parameters, detected before anything is presented.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("not enough images ({available}) for sequence length ({seq_length})")]
    InsufficientImages { available: usize, seq_length: usize },
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("failed to read configuration: {0}")]
    Parse(String),
}

impl ConfigurationError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

/// The display surface failed mid-run; fatal for the current run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PresentationFailure {
    #[error("display surface lost: {0}")]
    SurfaceLost(String),
    #[error("failed to draw frame: {0}")]
    Draw(String),
    #[error("display was closed")]
    Closed,
}
