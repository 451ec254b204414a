pub mod daq;
pub mod gamepad;
pub mod pulse;
pub mod response;
pub mod scripted;
pub mod screening;
pub mod status;

pub use pulse::{DigitalOutput, PulseChannel, DEFAULT_SETTLE};
pub use response::{ButtonEdgeState, ButtonSource, Key, KeySource, ResponseChannel};
pub use screening::{ScreeningBattery, ScreeningReport};
pub use status::{HardwareError, HardwareStatus};
