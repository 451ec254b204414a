pub mod config;
pub mod devices;
pub mod error;
pub mod generator;
pub mod messages;
pub mod record;
pub mod runner;
pub mod session;
pub mod summary;

pub use config::{Config, DeviceResponse, Language};
pub use devices::Devices;
pub use error::ExperimentError;
pub use generator::generate_plans;
pub use record::{HardwareReport, MemorySink, ParticipantInfo, RecordSink, RunOutcome, RunRecord};
pub use runner::{SequenceOutcome, SequenceRecord, SequenceRunner, draw_lead_blank};
pub use session::Session;
pub use summary::Summary;
