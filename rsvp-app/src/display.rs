use anyhow::{Context, Result};
use pixels::{Pixels, SurfaceTexture};
use rsvp_core::{Frame, PresentationFailure};
use rsvp_render::SkiaRenderer;
use rsvp_timing::{FrameIntervalMonitor, Timer, TimingSource};
use tracing::{debug, info, warn};

use crate::window::SharedHost;

/// Presents measured when the monitor does not report its refresh rate.
const CALIBRATION_FRAMES: usize = 60;
const FALLBACK_INTERVAL: f64 = 1.0 / 60.0;

/// `TimingSource` backed by a pixels surface on the shared winit window.
///
/// Presents go through the vsync'd swap chain; the realized onset is the
/// timer reading right after the swap returns.
pub struct PixelsDisplay<T: Timer> {
    host: SharedHost,
    pixels: Option<Pixels<'static>>,
    renderer: SkiaRenderer,
    timer: T,
    inter_frame_interval: f64,
    monitor: FrameIntervalMonitor,
}

impl<T: Timer> PixelsDisplay<T> {
    pub fn open(host: SharedHost, mut renderer: SkiaRenderer, timer: T) -> Result<Self> {
        let (window, refresh_rate) = {
            let host = host.borrow();
            let window = host.window().cloned().context("window is not open")?;
            (window, host.refresh_rate())
        };
        let size = window.inner_size();
        renderer.resize(size.width, size.height)?;
        let surface = SurfaceTexture::new(size.width, size.height, window);
        let pixels = Pixels::new(size.width, size.height, surface)?;

        let mut display = Self {
            host,
            pixels: Some(pixels),
            renderer,
            timer,
            inter_frame_interval: FALLBACK_INTERVAL,
            monitor: FrameIntervalMonitor::new(600),
        };
        display.inter_frame_interval = match refresh_rate {
            Some(hz) => 1.0 / hz,
            None => display.calibrate()?,
        };
        let interval = display.inter_frame_interval;
        info!(
            refresh_rate = 1.0 / interval,
            inter_frame_ms = interval * 1e3,
            "display ready"
        );
        Ok(display)
    }

    /// Measures the present cadence on blank frames.
    fn calibrate(&mut self) -> Result<f64> {
        let mut probe = FrameIntervalMonitor::new(CALIBRATION_FRAMES);
        self.draw(&Frame::Blank)?;
        for _ in 0..=CALIBRATION_FRAMES {
            probe.record_present(self.present(None)?);
        }
        let stats = probe.calibration_stats();
        debug!(?stats, "refresh calibration");
        if stats.average_frame_time > 0.0 {
            Ok(stats.average_frame_time)
        } else {
            warn!("refresh calibration failed, assuming 60 Hz");
            Ok(FALLBACK_INTERVAL)
        }
    }

    /// Pumps the event loop and follows any window resize.
    fn sync_window(&mut self) -> Result<(), PresentationFailure> {
        let resized = {
            let mut host = self.host.borrow_mut();
            if !host.pump() || !host.is_open() {
                return Err(PresentationFailure::Closed);
            }
            host.take_resize()
        };
        let Some(size) = resized.filter(|s| s.width > 0 && s.height > 0) else {
            return Ok(());
        };
        let pixels = self.pixels.as_mut().ok_or(PresentationFailure::Closed)?;
        pixels
            .resize_surface(size.width, size.height)
            .map_err(|e| PresentationFailure::SurfaceLost(e.to_string()))?;
        pixels
            .resize_buffer(size.width, size.height)
            .map_err(|e| PresentationFailure::SurfaceLost(e.to_string()))?;
        self.renderer
            .resize(size.width, size.height)
            .map_err(|e| PresentationFailure::Draw(format!("{e:#}")))?;
        info!(width = size.width, height = size.height, "display resized");
        Ok(())
    }
}

impl<T: Timer> TimingSource for PixelsDisplay<T> {
    fn inter_frame_interval(&self) -> f64 {
        self.inter_frame_interval
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), PresentationFailure> {
        self.sync_window()?;
        self.renderer
            .render(frame)
            .map_err(|e| PresentationFailure::Draw(format!("{e:#}")))?;
        let pixels = self.pixels.as_mut().ok_or(PresentationFailure::Closed)?;
        self.renderer
            .copy_to(pixels.frame_mut())
            .map_err(|e| PresentationFailure::Draw(format!("{e:#}")))
    }

    fn present(&mut self, target: Option<f64>) -> Result<f64, PresentationFailure> {
        if let Some(target) = target {
            self.timer.sleep_until(target);
        }
        let pixels = self.pixels.as_mut().ok_or(PresentationFailure::Closed)?;
        pixels.render().map_err(|e| match e {
            pixels::Error::Surface(err) => PresentationFailure::SurfaceLost(err.to_string()),
            other => PresentationFailure::Draw(other.to_string()),
        })?;
        let realized = self.timer.now();
        self.monitor.record_present(realized);
        Ok(realized)
    }

    fn release(&mut self) {
        if self.pixels.take().is_none() {
            return;
        }
        let stats = self.monitor.calibration_stats();
        if stats.samples > 0 {
            info!(
                frames = stats.samples,
                mean_ms = stats.average_frame_time * 1e3,
                jitter_ms = stats.jitter * 1e3,
                max_ms = stats.max_frame_time * 1e3,
                "frame intervals"
            );
        }
        self.host.borrow_mut().close();
    }
}

impl<T: Timer> Drop for PixelsDisplay<T> {
    fn drop(&mut self) {
        self.release();
    }
}
