use rsvp_core::{ConfigurationError, PresentationFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Presentation(#[from] PresentationFailure),
    #[error("failed to persist run data: {0}")]
    Persistence(String),
}
