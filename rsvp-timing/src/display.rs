use rsvp_core::{Frame, PresentationFailure};

/// Fraction of a frame period subtracted from every onset target.
pub const SLACK_FRACTION: f64 = 1.0 / 3.0;

pub fn slack_for(inter_frame_interval: f64) -> f64 {
    inter_frame_interval * SLACK_FRACTION
}

/// A display surface that stages one frame at a time and presents it
/// against the hardware refresh clock.
///
/// `present(Some(t))` blocks until the first refresh at or after `t` and
/// returns the realized onset on the same clock the engine's [`crate::Timer`]
/// reads. `present(None)` shows the staged frame on the next refresh.
pub trait TimingSource {
    /// Seconds per refresh of the active display.
    fn inter_frame_interval(&self) -> f64;

    fn slack(&self) -> f64 {
        slack_for(self.inter_frame_interval())
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), PresentationFailure>;

    fn present(&mut self, target: Option<f64>) -> Result<f64, PresentationFailure>;

    /// Gives the surface back; further presents may fail.
    fn release(&mut self) {}
}

impl<D: TimingSource + ?Sized> TimingSource for &mut D {
    fn inter_frame_interval(&self) -> f64 {
        (**self).inter_frame_interval()
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), PresentationFailure> {
        (**self).draw(frame)
    }

    fn present(&mut self, target: Option<f64>) -> Result<f64, PresentationFailure> {
        (**self).present(target)
    }

    fn release(&mut self) {
        (**self).release()
    }
}
