use rsvp_core::ResponseSignal;
use tracing::{debug, warn};

use crate::status::{HardwareError, HardwareStatus};

/// Keys the response channel distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    Escape,
    Char(char),
    Other,
}

/// Keyboard-like source reporting presses as discrete events.
pub trait KeySource {
    /// Keys pressed since the previous call, oldest first. Never blocks.
    fn pressed_since_last_poll(&mut self) -> Vec<Key>;
}

impl<K: KeySource + ?Sized> KeySource for Box<K> {
    fn pressed_since_last_poll(&mut self) -> Vec<Key> {
        (**self).pressed_since_last_poll()
    }
}

/// Level-reporting device such as a gamepad or button box.
pub trait ButtonSource {
    fn name(&self) -> &str;

    fn button_count(&self) -> usize;

    /// Pulls pending device state; called once per poll before any reads.
    fn refresh(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn is_pressed(&mut self, button: usize) -> Result<bool, HardwareError>;

    fn release(&mut self) {}
}

/// Previous-pressed flag turning a button level into press edges.
///
/// After [`reset`](Self::reset) the next observation only establishes the
/// baseline, so a button still held from before the reset does not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdgeState {
    was_pressed: bool,
    armed: bool,
}

impl Default for ButtonEdgeState {
    fn default() -> Self {
        Self {
            was_pressed: false,
            armed: true,
        }
    }
}

impl ButtonEdgeState {
    /// Feeds the current level; true only on a released-to-pressed transition.
    pub fn update(&mut self, pressed: bool) -> bool {
        let fired = self.armed && pressed && !self.was_pressed;
        self.was_pressed = pressed;
        self.armed = true;
        fired
    }

    pub fn reset(&mut self) {
        self.was_pressed = false;
        self.armed = false;
    }

    pub fn was_pressed(&self) -> bool {
        self.was_pressed
    }
}

/// Keyboard plus optional button device behind one edge-triggered poll.
pub struct ResponseChannel<K: KeySource> {
    keys: K,
    device: Option<Box<dyn ButtonSource>>,
    edges: Vec<(usize, ButtonEdgeState)>,
    status: HardwareStatus,
}

impl<K: KeySource> ResponseChannel<K> {
    pub fn keyboard_only(keys: K) -> Self {
        Self {
            keys,
            device: None,
            edges: Vec::new(),
            status: HardwareStatus::available("keyboard"),
        }
    }

    /// Uses `device` when it opened; otherwise falls back to the keyboard and
    /// reports the channel as degraded.
    pub fn with_device(
        keys: K,
        device: Result<Box<dyn ButtonSource>, HardwareError>,
        tracked_buttons: &[usize],
    ) -> Self {
        match device {
            Ok(device) => {
                let count = device.button_count();
                let edges: Vec<_> = tracked_buttons
                    .iter()
                    .copied()
                    .filter(|&b| count == 0 || b < count)
                    .map(|b| (b, ButtonEdgeState::default()))
                    .collect();
                if edges.len() < tracked_buttons.len() {
                    warn!(
                        device = device.name(),
                        buttons = count,
                        "some tracked buttons do not exist on the device"
                    );
                }
                let status = HardwareStatus::available(device.name());
                Self {
                    keys,
                    device: Some(device),
                    edges,
                    status,
                }
            }
            Err(err) => {
                warn!("response device unavailable, falling back to keyboard: {err}");
                Self {
                    keys,
                    device: None,
                    edges: Vec::new(),
                    status: HardwareStatus::degraded(format!("keyboard only: {err}")),
                }
            }
        }
    }

    pub fn status(&self) -> &HardwareStatus {
        &self.status
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.name())
    }

    /// One non-blocking check of every input.
    pub fn poll(&mut self) -> ResponseSignal {
        let mut signal = ResponseSignal::None;
        for key in self.keys.pressed_since_last_poll() {
            signal = signal.merge(match key {
                Key::Escape => ResponseSignal::Cancel,
                Key::Space => ResponseSignal::Respond,
                _ => ResponseSignal::None,
            });
        }

        if let Some(device) = self.device.as_mut() {
            if let Err(err) = device.refresh() {
                debug!("device refresh failed: {err}");
            }
            // Every tracked button is sampled so no edge is left stale.
            for (button, edge) in self.edges.iter_mut() {
                let pressed = device.is_pressed(*button).unwrap_or_else(|err| {
                    debug!(button = *button, "button read failed: {err}");
                    false
                });
                if edge.update(pressed) {
                    debug!(button = *button, "button pressed");
                    signal = signal.merge(ResponseSignal::Respond);
                }
            }
        }
        signal
    }

    /// Re-arms edge detection; called at the start of every sequence.
    pub fn reset_edges(&mut self) {
        for (_, edge) in self.edges.iter_mut() {
            edge.reset();
        }
    }

    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            debug!("response device released");
        }
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedButtons, ScriptedKeys};
    use rsvp_timing::{SimulatedClock, Timer};
    use std::time::Duration;

    fn gamepad_channel(
        clock: &SimulatedClock,
        presses: &[(usize, f64, f64)],
    ) -> ResponseChannel<ScriptedKeys<SimulatedClock>> {
        let mut buttons = ScriptedButtons::new(clock.clone(), 4);
        for &(button, from, to) in presses {
            buttons = buttons.hold(button, from, to);
        }
        ResponseChannel::with_device(
            ScriptedKeys::new(clock.clone()),
            Ok(Box::new(buttons)),
            &[0, 1],
        )
    }

    fn poll_every_ms(
        channel: &mut ResponseChannel<ScriptedKeys<SimulatedClock>>,
        clock: &SimulatedClock,
        polls: usize,
    ) -> usize {
        let mut responds = 0;
        for _ in 0..polls {
            if channel.poll() == ResponseSignal::Respond {
                responds += 1;
            }
            clock.sleep(Duration::from_millis(1));
        }
        responds
    }

    #[test]
    fn edge_fires_once_per_press() {
        let mut edge = ButtonEdgeState::default();
        assert!(edge.update(true));
        assert!(!edge.update(true));
        assert!(!edge.update(true));
        assert!(!edge.update(false));
        assert!(edge.update(true));
    }

    #[test]
    fn reset_swallows_held_button() {
        let mut edge = ButtonEdgeState::default();
        assert!(edge.update(true));
        edge.reset();
        assert!(!edge.update(true));
        assert!(!edge.update(false));
        assert!(edge.update(true));
    }

    #[test]
    fn held_button_yields_single_respond() {
        let clock = SimulatedClock::new();
        let mut channel = gamepad_channel(&clock, &[(0, 0.010, 0.050)]);
        assert_eq!(poll_every_ms(&mut channel, &clock, 100), 1);
    }

    #[test]
    fn release_and_repress_yields_second_respond() {
        let clock = SimulatedClock::new();
        let mut channel = gamepad_channel(&clock, &[(1, 0.010, 0.030), (1, 0.060, 0.080)]);
        assert_eq!(poll_every_ms(&mut channel, &clock, 100), 2);
    }

    #[test]
    fn held_across_reset_does_not_fire() {
        let clock = SimulatedClock::new();
        let mut channel = gamepad_channel(&clock, &[(0, 0.0, 0.5)]);
        assert_eq!(poll_every_ms(&mut channel, &clock, 10), 1);
        channel.reset_edges();
        assert_eq!(channel.poll(), ResponseSignal::None);
        assert_eq!(poll_every_ms(&mut channel, &clock, 100), 0);
    }

    #[test]
    fn both_tracked_buttons_are_sampled() {
        let clock = SimulatedClock::new();
        let mut channel = gamepad_channel(&clock, &[(0, 0.0, 0.2), (1, 0.05, 0.2)]);
        assert_eq!(poll_every_ms(&mut channel, &clock, 100), 2);
    }

    #[test]
    fn untracked_button_is_ignored() {
        let clock = SimulatedClock::new();
        let mut channel = gamepad_channel(&clock, &[(3, 0.0, 0.05)]);
        assert_eq!(poll_every_ms(&mut channel, &clock, 100), 0);
    }

    #[test]
    fn keyboard_space_and_escape() {
        let clock = SimulatedClock::new();
        let keys = ScriptedKeys::new(clock.clone())
            .press_at(0.002, Key::Space)
            .press_at(0.004, Key::Char('q'))
            .press_at(0.006, Key::Escape);
        let mut channel = ResponseChannel::keyboard_only(keys);
        let mut seen = Vec::new();
        for _ in 0..10 {
            let signal = channel.poll();
            if signal != ResponseSignal::None {
                seen.push(signal);
            }
            clock.sleep(Duration::from_millis(1));
        }
        assert_eq!(seen, vec![ResponseSignal::Respond, ResponseSignal::Cancel]);
    }

    #[test]
    fn cancel_wins_within_one_poll() {
        let clock = SimulatedClock::starting_at(1.0);
        let keys = ScriptedKeys::new(clock.clone())
            .press_at(0.1, Key::Space)
            .press_at(0.2, Key::Escape);
        let mut channel = ResponseChannel::keyboard_only(keys);
        assert_eq!(channel.poll(), ResponseSignal::Cancel);
    }

    #[test]
    fn missing_device_degrades_to_keyboard() {
        let clock = SimulatedClock::new();
        let keys = ScriptedKeys::new(clock.clone()).press_at(0.0, Key::Space);
        let mut channel =
            ResponseChannel::with_device(keys, Err(HardwareError::NotFound("gamepad")), &[0, 1]);
        assert!(matches!(channel.status(), HardwareStatus::Degraded { .. }));
        assert!(channel.device_name().is_none());
        assert_eq!(channel.poll(), ResponseSignal::Respond);
    }

    #[test]
    fn device_read_errors_count_as_released() {
        let clock = SimulatedClock::new();
        let buttons = ScriptedButtons::new(clock.clone(), 2)
            .hold(0, 0.0, 1.0)
            .failing();
        let mut channel = ResponseChannel::with_device(
            ScriptedKeys::new(clock.clone()),
            Ok(Box::new(buttons)),
            &[0, 1],
        );
        assert_eq!(poll_every_ms(&mut channel, &clock, 20), 0);
    }
}
