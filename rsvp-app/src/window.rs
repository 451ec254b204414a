use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use rsvp_hardware::Key;
use tracing::{debug, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowId};

use crate::keyboard::map_key;

/// Pumps allowed for the first `resumed` callback to create the window.
const STARTUP_PUMPS: usize = 300;
const STARTUP_PUMP_TIMEOUT: Duration = Duration::from_millis(10);

/// Handle shared by the display and the key source; both pump the same loop.
pub type SharedHost = Rc<RefCell<WindowHost>>;

#[derive(Debug, Clone)]
pub struct WindowSettings {
    pub title: String,
    pub size: [u32; 2],
    pub fullscreen: bool,
}

struct HostState {
    settings: WindowSettings,
    window: Option<Arc<Window>>,
    refresh_rate: Option<f64>,
    keys: VecDeque<Key>,
    resized: Option<PhysicalSize<u32>>,
    error: Option<anyhow::Error>,
}

impl HostState {
    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next());
        self.refresh_rate = monitor
            .as_ref()
            .and_then(|m| m.refresh_rate_millihertz())
            .map(|mhz| mhz as f64 / 1000.0);

        let attributes = Window::default_attributes()
            .with_title(self.settings.title.clone())
            .with_resizable(false);
        let attributes = if self.settings.fullscreen {
            attributes.with_fullscreen(Some(Fullscreen::Borderless(monitor)))
        } else {
            let [w, h] = self.settings.size;
            attributes.with_inner_size(PhysicalSize::new(w, h))
        };

        let window = Arc::new(event_loop.create_window(attributes)?);
        window.set_cursor_visible(false);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale_factor = window.scale_factor(),
            refresh_rate = ?self.refresh_rate,
            "window created"
        );
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler for HostState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window(event_loop) {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            // Closing the window cancels like Escape does.
            WindowEvent::CloseRequested => self.keys.push_back(Key::Escape),
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.keys
                    .push_back(map_key(event.physical_key, &event.logical_key));
            }
            WindowEvent::Resized(size) => self.resized = Some(size),
            _ => {}
        }
    }
}

/// A winit window driven by `pump_app_events` instead of `run_app`, so the
/// blocking session loop stays in charge of timing.
pub struct WindowHost {
    event_loop: EventLoop<()>,
    state: HostState,
    exited: bool,
}

impl WindowHost {
    pub fn open(settings: WindowSettings) -> Result<SharedHost> {
        let event_loop = EventLoop::new()?;
        let mut host = Self {
            event_loop,
            state: HostState {
                settings,
                window: None,
                refresh_rate: None,
                keys: VecDeque::new(),
                resized: None,
                error: None,
            },
            exited: false,
        };

        for _ in 0..STARTUP_PUMPS {
            host.pump_with(Some(STARTUP_PUMP_TIMEOUT));
            if let Some(err) = host.state.error.take() {
                return Err(err);
            }
            if host.state.window.is_some() {
                host.state.resized = None;
                return Ok(Rc::new(RefCell::new(host)));
            }
            if host.exited {
                break;
            }
        }
        bail!("the window system never created a window")
    }

    /// Dispatches pending events without blocking; false once the loop exited.
    pub fn pump(&mut self) -> bool {
        self.pump_with(Some(Duration::ZERO))
    }

    fn pump_with(&mut self, timeout: Option<Duration>) -> bool {
        if self.exited {
            return false;
        }
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            debug!(code, "event loop exited");
            self.exited = true;
        }
        !self.exited
    }

    pub fn is_open(&self) -> bool {
        !self.exited && self.state.window.is_some()
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.state.window.as_ref()
    }

    /// Refresh rate the monitor reports, in Hz.
    pub fn refresh_rate(&self) -> Option<f64> {
        self.state.refresh_rate.filter(|hz| *hz > 0.0)
    }

    pub fn inner_size(&self) -> Option<PhysicalSize<u32>> {
        self.window().map(|w| w.inner_size())
    }

    pub fn take_keys(&mut self) -> Vec<Key> {
        self.state.keys.drain(..).collect()
    }

    pub fn take_resize(&mut self) -> Option<PhysicalSize<u32>> {
        self.state.resized.take()
    }

    /// Restores the cursor and drops the window; later pumps do nothing.
    pub fn close(&mut self) {
        if let Some(window) = self.state.window.take() {
            window.set_cursor_visible(true);
            debug!("window closed");
        }
        self.state.keys.clear();
        self.exited = true;
    }
}
