//! Gamepad backend for the response channel.
//!
//! Button indices follow the face-button order of the lab's controllers:
//! 0 = X (west), 1 = A (south), 2 = B (east), 3 = Y (north).

use crate::response::ButtonSource;
use crate::status::HardwareError;

/// Opens the first connected gamepad.
pub fn open_gamepad() -> Result<Box<dyn ButtonSource>, HardwareError> {
    #[cfg(feature = "gamepad")]
    {
        backend::GilrsGamepad::open().map(|g| Box::new(g) as Box<dyn ButtonSource>)
    }
    #[cfg(not(feature = "gamepad"))]
    {
        Err(HardwareError::NotCompiled("gamepad"))
    }
}

#[cfg(feature = "gamepad")]
mod backend {
    use gilrs::{Button, GamepadId, Gilrs};
    use tracing::info;

    use crate::response::ButtonSource;
    use crate::status::HardwareError;

    const BUTTON_ORDER: [Button; 8] = [
        Button::West,
        Button::South,
        Button::East,
        Button::North,
        Button::LeftTrigger,
        Button::RightTrigger,
        Button::Select,
        Button::Start,
    ];

    pub struct GilrsGamepad {
        gilrs: Gilrs,
        id: GamepadId,
        name: String,
    }

    impl GilrsGamepad {
        pub fn open() -> Result<Self, HardwareError> {
            let gilrs = Gilrs::new().map_err(|e| HardwareError::Device(e.to_string()))?;
            let (id, name) = gilrs
                .gamepads()
                .find(|(_, pad)| pad.is_connected())
                .map(|(id, pad)| (id, pad.name().to_string()))
                .ok_or(HardwareError::NotFound("gamepad"))?;
            info!(gamepad = %name, "gamepad connected");
            Ok(Self { gilrs, id, name })
        }
    }

    impl ButtonSource for GilrsGamepad {
        fn name(&self) -> &str {
            &self.name
        }

        fn button_count(&self) -> usize {
            BUTTON_ORDER.len()
        }

        fn refresh(&mut self) -> Result<(), HardwareError> {
            while self.gilrs.next_event().is_some() {}
            if self.gilrs.gamepad(self.id).is_connected() {
                Ok(())
            } else {
                Err(HardwareError::Device(format!("{} disconnected", self.name)))
            }
        }

        fn is_pressed(&mut self, button: usize) -> Result<bool, HardwareError> {
            let button = BUTTON_ORDER
                .get(button)
                .copied()
                .ok_or_else(|| HardwareError::Device(format!("no button {button}")))?;
            Ok(self.gilrs.gamepad(self.id).is_pressed(button))
        }
    }
}
