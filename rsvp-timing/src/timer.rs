use std::time::{Duration, Instant};

/// Remaining time below which `sleep_until` stops yielding to the OS and spins.
const SPIN_MARGIN: Duration = Duration::from_micros(1500);

/// Monotonic clock plus the waits the engine is allowed to perform on it.
///
/// Timestamps are seconds since the timer's epoch.
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> f64;

    fn elapsed(&self, since: f64) -> Duration {
        Duration::from_secs_f64((self.now() - since).max(0.0))
    }

    fn sleep(&self, d: Duration);

    /// Blocks until `deadline`; returns at once if it already passed.
    fn sleep_until(&self, deadline: f64) {
        let remaining = deadline - self.now();
        if remaining > 0.0 {
            self.sleep(Duration::from_secs_f64(remaining));
        }
    }
}

/// Platform-specific high-precision timer.
///
/// Long waits are handed to the OS; the last stretch below [`SPIN_MARGIN`]
/// is spun so wake-up jitter stays well under a frame.
#[derive(Debug, Clone, Copy)]
pub struct HighPrecisionTimer {
    pub start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        if duration > SPIN_MARGIN {
            let coarse = duration - SPIN_MARGIN;
            #[cfg(target_os = "linux")]
            self.linux_sleep(coarse);
            #[cfg(target_os = "macos")]
            self.macos_sleep(coarse);
            #[cfg(not(any(target_os = "linux", target_os = "macos")))]
            std::thread::sleep(coarse);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }

    /// Sleeps on an absolute CLOCK_MONOTONIC deadline so a signal
    /// interruption resumes against the same wake-up time.
    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_gettime, clock_nanosleep, timespec, CLOCK_MONOTONIC, EINTR, TIMER_ABSTIME};

        let mut wake = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        unsafe {
            if clock_gettime(CLOCK_MONOTONIC, &mut wake) != 0 {
                tracing::warn!("clock_gettime failed, falling back to thread::sleep");
                std::thread::sleep(duration);
                return;
            }
        }
        let nanos = wake.tv_nsec as u64 + duration.subsec_nanos() as u64;
        wake.tv_sec += duration.as_secs() as libc::time_t + (nanos / 1_000_000_000) as libc::time_t;
        wake.tv_nsec = (nanos % 1_000_000_000) as libc::c_long;

        loop {
            let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, TIMER_ABSTIME, &wake, std::ptr::null_mut()) };
            if rc != EINTR {
                break;
            }
        }
    }

    #[cfg(target_os = "macos")]
    fn macos_sleep(&self, duration: Duration) {
        use mach2::mach_time::{
            mach_absolute_time, mach_timebase_info, mach_timebase_info_data_t, mach_wait_until,
        };

        let mut timebase = mach_timebase_info_data_t { numer: 0, denom: 0 };
        unsafe {
            if mach_timebase_info(&mut timebase) != 0 || timebase.numer == 0 {
                tracing::warn!("mach timebase unavailable, falling back to thread::sleep");
                std::thread::sleep(duration);
                return;
            }
            let ticks = (duration.as_nanos() * timebase.denom as u128 / timebase.numer as u128) as u64;
            mach_wait_until(mach_absolute_time() + ticks);
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic() {
        let timer = HighPrecisionTimer::new();
        let a = timer.now();
        let b = timer.now();
        assert!(b >= a);
    }

    #[test]
    fn sleep_until_reaches_deadline() {
        let timer = HighPrecisionTimer::new();
        let deadline = timer.now() + 0.005;
        timer.sleep_until(deadline);
        assert!(timer.now() >= deadline);
    }

    #[test]
    fn sleep_until_past_deadline_returns_immediately() {
        let timer = HighPrecisionTimer::new();
        let before = Instant::now();
        timer.sleep_until(timer.now() - 1.0);
        assert!(before.elapsed() < Duration::from_millis(5));
    }
}
