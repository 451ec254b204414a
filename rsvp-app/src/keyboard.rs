use rsvp_hardware::{Key, KeySource};
use winit::keyboard::{Key as LogicalKey, KeyCode, PhysicalKey};

use crate::window::SharedHost;

/// Keyboard presses collected from the shared winit event loop.
pub struct WinitKeys {
    host: SharedHost,
}

impl WinitKeys {
    pub fn new(host: SharedHost) -> Self {
        Self { host }
    }
}

impl KeySource for WinitKeys {
    fn pressed_since_last_poll(&mut self) -> Vec<Key> {
        let mut host = self.host.borrow_mut();
        host.pump();
        host.take_keys()
    }
}

/// Space and Escape by physical position, everything else by its character.
pub fn map_key(physical: PhysicalKey, logical: &LogicalKey) -> Key {
    match physical {
        PhysicalKey::Code(KeyCode::Space) => return Key::Space,
        PhysicalKey::Code(KeyCode::Escape) => return Key::Escape,
        _ => {}
    }
    match logical {
        LogicalKey::Character(s) => s
            .chars()
            .next()
            .map(|c| Key::Char(c.to_ascii_lowercase()))
            .unwrap_or(Key::Other),
        _ => Key::Other,
    }
}
