pub mod error;
pub mod frame;
pub mod pulse;
pub mod response;
pub mod state;
pub mod trial;

pub use error::{ConfigurationError, PresentationFailure};
pub use frame::Frame;
pub use pulse::PulseCode;
pub use response::ResponseSignal;
pub use state::SequenceState;
pub use trial::{FrameKind, ResponseEvent, SequencePlan, TimingSample};
