//! Timer-driven stand-ins for participants and peripherals.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rsvp_timing::Timer;

use crate::pulse::DigitalOutput;
use crate::response::{ButtonSource, Key, KeySource};
use crate::status::HardwareError;

/// Key presses delivered once the timer passes their scheduled time.
#[derive(Debug, Clone)]
pub struct ScriptedKeys<T: Timer> {
    timer: T,
    pending: VecDeque<(f64, Key)>,
}

impl<T: Timer> ScriptedKeys<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            pending: VecDeque::new(),
        }
    }

    pub fn press_at(mut self, at: f64, key: Key) -> Self {
        let idx = self.pending.partition_point(|(t, _)| *t <= at);
        self.pending.insert(idx, (at, key));
        self
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl<T: Timer> KeySource for ScriptedKeys<T> {
    fn pressed_since_last_poll(&mut self) -> Vec<Key> {
        let now = self.timer.now();
        let mut keys = Vec::new();
        while let Some(&(at, key)) = self.pending.front() {
            if at > now {
                break;
            }
            keys.push(key);
            self.pending.pop_front();
        }
        keys
    }
}

/// Buttons held over scripted intervals `[from, to)`.
#[derive(Debug, Clone)]
pub struct ScriptedButtons<T: Timer> {
    timer: T,
    buttons: usize,
    holds: Vec<(usize, f64, f64)>,
    failing: bool,
    released: Arc<Mutex<bool>>,
}

impl<T: Timer> ScriptedButtons<T> {
    pub fn new(timer: T, buttons: usize) -> Self {
        Self {
            timer,
            buttons,
            holds: Vec::new(),
            failing: false,
            released: Arc::new(Mutex::new(false)),
        }
    }

    pub fn hold(mut self, button: usize, from: f64, to: f64) -> Self {
        self.holds.push((button, from, to));
        self
    }

    /// Every read fails as if the device was unplugged.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Flag flipped by `release`, observable after the source was boxed away.
    pub fn release_flag(&self) -> Arc<Mutex<bool>> {
        Arc::clone(&self.released)
    }
}

impl<T: Timer> ButtonSource for ScriptedButtons<T> {
    fn name(&self) -> &str {
        "scripted gamepad"
    }

    fn button_count(&self) -> usize {
        self.buttons
    }

    fn is_pressed(&mut self, button: usize) -> Result<bool, HardwareError> {
        if self.failing {
            return Err(HardwareError::Device("scripted read failure".to_string()));
        }
        let now = self.timer.now();
        Ok(self
            .holds
            .iter()
            .any(|&(b, from, to)| b == button && from <= now && now < to))
    }

    fn release(&mut self) {
        if let Ok(mut released) = self.released.lock() {
            *released = true;
        }
    }
}

/// Digital output that logs every write with its timer timestamp.
#[derive(Debug, Clone)]
pub struct RecordingOutput<T: Timer> {
    timer: T,
    writes: Arc<Mutex<Vec<(f64, u8)>>>,
    failing: bool,
    closed: Arc<Mutex<bool>>,
}

impl<T: Timer> RecordingOutput<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            writes: Arc::new(Mutex::new(Vec::new())),
            failing: false,
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Shared handle to the write log.
    pub fn log(&self) -> Arc<Mutex<Vec<(f64, u8)>>> {
        Arc::clone(&self.writes)
    }

    pub fn closed_flag(&self) -> Arc<Mutex<bool>> {
        Arc::clone(&self.closed)
    }
}

impl<T: Timer> DigitalOutput for RecordingOutput<T> {
    fn name(&self) -> String {
        "recording output".to_string()
    }

    fn write(&mut self, value: u8) -> Result<(), HardwareError> {
        if self.failing {
            return Err(HardwareError::Device("scripted write failure".to_string()));
        }
        if let Ok(mut writes) = self.writes.lock() {
            writes.push((self.timer.now(), value));
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
    }
}
