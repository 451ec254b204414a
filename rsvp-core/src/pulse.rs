use serde::{Deserialize, Serialize};

/// Symbolic event markers sent to the recording hardware.
///
/// The numeric table is fixed so recordings stay comparable across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseCode {
    DataSignatureOn,
    DataSignatureOff,
    PictureOnsetA,
    PictureOnsetB,
    BlankOn,
    TrialOn,
    ResponseOffset,
    ValueReset,
}

impl PulseCode {
    pub const ALL: [PulseCode; 8] = [
        PulseCode::DataSignatureOn,
        PulseCode::DataSignatureOff,
        PulseCode::PictureOnsetA,
        PulseCode::PictureOnsetB,
        PulseCode::BlankOn,
        PulseCode::TrialOn,
        PulseCode::ResponseOffset,
        PulseCode::ValueReset,
    ];

    pub const fn value(self) -> u8 {
        match self {
            PulseCode::DataSignatureOn => 85,
            PulseCode::DataSignatureOff => 84,
            PulseCode::PictureOnsetA => 3,
            PulseCode::PictureOnsetB => 1,
            PulseCode::BlankOn => 69,
            PulseCode::TrialOn => 113,
            PulseCode::ResponseOffset => 81,
            PulseCode::ValueReset => 0,
        }
    }

    /// Onset marker for the image at 0-based `position`: A for the first
    /// image and every odd position, B for even positions after the first.
    pub const fn for_image_position(position: usize) -> Self {
        if position == 0 || position % 2 == 1 {
            PulseCode::PictureOnsetA
        } else {
            PulseCode::PictureOnsetB
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.value() == value)
    }
}

impl From<PulseCode> for u8 {
    fn from(code: PulseCode) -> u8 {
        code.value()
    }
}
