use rsvp_hardware::{KeySource, PulseChannel, ResponseChannel};
use rsvp_timing::{Timer, TimingSource};
use tracing::info;

/// Every handle a run needs, owned in one place so teardown cannot skip one.
pub struct Devices<D, K, T>
where
    D: TimingSource,
    K: KeySource,
    T: Timer,
{
    pub display: D,
    pub responses: ResponseChannel<K>,
    pub pulses: PulseChannel<T>,
    pub timer: T,
    released: bool,
}

impl<D, K, T> Devices<D, K, T>
where
    D: TimingSource,
    K: KeySource,
    T: Timer,
{
    pub fn new(display: D, responses: ResponseChannel<K>, pulses: PulseChannel<T>, timer: T) -> Self {
        Self {
            display,
            responses,
            pulses,
            timer,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Releases response, pulse and display handles. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.responses.release();
        self.pulses.release();
        self.display.release();
        self.released = true;
        info!("hardware released");
    }
}

impl<D, K, T> Drop for Devices<D, K, T>
where
    D: TimingSource,
    K: KeySource,
    T: Timer,
{
    fn drop(&mut self) {
        self.release();
    }
}
