use serde::{Deserialize, Serialize};

/// What a display surface is asked to show on its next present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// Uniform background, no stimulus.
    Blank,
    /// Full-screen image by index into the loaded image set.
    Image { index: usize },
    /// Centered, wrapped text (ready screens, instructions, summary).
    Message { text: String },
    /// Uniform solid color, used by the display check of the screening battery.
    Solid { rgb: [u8; 3] },
}

impl Frame {
    pub fn message(text: impl Into<String>) -> Self {
        Frame::Message { text: text.into() }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Frame::Blank)
    }
}
