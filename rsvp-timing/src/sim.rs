//! Deterministic stand-ins for the wall clock and the display.
//!
//! The simulated clock only moves when something sleeps or presents, so a
//! whole session can run in microseconds of real time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rsvp_core::{Frame, PresentationFailure};
use tracing::{debug, warn};

use crate::display::TimingSource;
use crate::timer::Timer;

/// Shared virtual clock; clones observe and advance the same time.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    nanos: Arc<AtomicU64>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(seconds: f64) -> Self {
        let clock = Self::new();
        clock.advance(Duration::from_secs_f64(seconds));
        clock
    }

    pub fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    pub fn advance(&self, d: Duration) {
        self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Moves the clock forward to `nanos`; never moves it back.
    pub fn advance_to_nanos(&self, nanos: u64) {
        self.nanos.fetch_max(nanos, Ordering::SeqCst);
    }
}

impl Timer for SimulatedClock {
    fn now(&self) -> f64 {
        self.now_nanos() as f64 / 1e9
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// Display double with a perfect refresh grid at multiples of the frame period.
#[derive(Debug)]
pub struct SimulatedDisplay {
    clock: SimulatedClock,
    ifi_nanos: u64,
    staged: Frame,
    presented: Vec<(Frame, f64)>,
    fail_at: Option<usize>,
    released: bool,
}

impl SimulatedDisplay {
    pub fn new(clock: SimulatedClock, refresh_hz: f64) -> Self {
        Self {
            clock,
            ifi_nanos: (1e9 / refresh_hz).round().max(1.0) as u64,
            staged: Frame::Blank,
            presented: Vec::new(),
            fail_at: None,
            released: false,
        }
    }

    /// Makes the `n`-th present (0-based) fail as if the surface was lost.
    pub fn fail_on_present(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn presented(&self) -> &[(Frame, f64)] {
        &self.presented
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn next_refresh_after(&self, now: u64) -> u64 {
        (now / self.ifi_nanos + 1) * self.ifi_nanos
    }

    fn first_refresh_at_or_after(&self, t: u64) -> u64 {
        t.div_ceil(self.ifi_nanos) * self.ifi_nanos
    }
}

impl TimingSource for SimulatedDisplay {
    fn inter_frame_interval(&self) -> f64 {
        self.ifi_nanos as f64 / 1e9
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), PresentationFailure> {
        if self.released {
            return Err(PresentationFailure::Closed);
        }
        self.staged = frame.clone();
        Ok(())
    }

    fn present(&mut self, target: Option<f64>) -> Result<f64, PresentationFailure> {
        if self.released {
            return Err(PresentationFailure::Closed);
        }
        if self.fail_at == Some(self.presented.len()) {
            warn!(present = self.presented.len(), "injected present failure");
            return Err(PresentationFailure::SurfaceLost(
                "simulated display failure".to_string(),
            ));
        }
        let now = self.clock.now_nanos();
        let mut onset = self.next_refresh_after(now);
        if let Some(target) = target {
            let target_nanos = (target.max(0.0) * 1e9).round() as u64;
            onset = onset.max(self.first_refresh_at_or_after(target_nanos));
        }
        self.clock.advance_to_nanos(onset);
        let realized = onset as f64 / 1e9;
        self.presented.push((self.staged.clone(), realized));
        Ok(realized)
    }

    fn release(&mut self) {
        if !self.released {
            debug!(frames = self.presented.len(), "simulated display released");
        }
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = SimulatedClock::new();
        let other = clock.clone();
        clock.sleep(Duration::from_millis(250));
        assert!((other.now() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn present_lands_on_refresh_grid() {
        let clock = SimulatedClock::new();
        let mut display = SimulatedDisplay::new(clock.clone(), 100.0);
        let first = display.present(None).unwrap();
        assert!((first - 0.01).abs() < 1e-9);

        let second = display.present(Some(0.5 - display.slack())).unwrap();
        assert!((second - 0.5).abs() < 1e-9);
        assert!((clock.now() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn past_target_presents_next_refresh() {
        let clock = SimulatedClock::starting_at(1.0);
        let mut display = SimulatedDisplay::new(clock, 100.0);
        let realized = display.present(Some(0.2)).unwrap();
        assert!((realized - 1.01).abs() < 1e-9);
    }

    #[test]
    fn presents_strictly_increase() {
        let clock = SimulatedClock::new();
        let mut display = SimulatedDisplay::new(clock, 60.0);
        let mut last = 0.0;
        for _ in 0..10 {
            let t = display.present(Some(last)).unwrap();
            assert!(t > last);
            last = t;
        }
    }

    #[test]
    fn injected_failure_and_release() {
        let clock = SimulatedClock::new();
        let mut display = SimulatedDisplay::new(clock, 60.0).fail_on_present(1);
        display.present(None).unwrap();
        assert!(matches!(
            display.present(None),
            Err(PresentationFailure::SurfaceLost(_))
        ));
        display.release();
        assert_eq!(display.draw(&Frame::Blank), Err(PresentationFailure::Closed));
    }

    #[test]
    fn release_is_idempotent() {
        let clock = SimulatedClock::new();
        let mut display = SimulatedDisplay::new(clock, 100.0);
        display.present(None).unwrap();
        display.release();
        display.release();
        assert!(display.is_released());
        assert_eq!(display.present(None), Err(PresentationFailure::Closed));
        assert_eq!(display.presented().len(), 1);
    }
}
