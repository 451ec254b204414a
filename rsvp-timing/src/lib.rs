pub mod calibration;
pub mod display;
pub mod sim;
pub mod timer;

pub use calibration::{CalibrationStats, FrameIntervalMonitor};
pub use display::{TimingSource, slack_for};
pub use sim::{SimulatedClock, SimulatedDisplay};
pub use timer::{HighPrecisionTimer, Timer};
