//! Byte-exact MTC wire messages
//!
//! Full-frame (10 bytes): `F0 7F 7F 01 01 hh mm ss ff F7` where `hh` is `0rrhhhhh`.
//!
//! Quarter-frame (2 bytes): `F1 0ppp dddd`, eight pieces per two frames:
//!
//! | piece | nibble |
//! |-------|--------|
//! | 0 | frames low 4 bits |
//! | 1 | frames bit 4 |
//! | 2 | seconds low 4 bits |
//! | 3 | seconds bits 4–5 |
//! | 4 | minutes low 4 bits |
//! | 5 | minutes bits 4–5 |
//! | 6 | hours low 4 bits |
//! | 7 | `0rrh`: rate bits and hours bit 4 |

use super::MtcFrameRate;
use crate::timecode::Components;
use thiserror::Error;

pub const QUARTER_FRAME_STATUS: u8 = 0xF1;
pub const FULL_FRAME_HEADER: [u8; 5] = [0xF0, 0x7F, 0x7F, 0x01, 0x01];
pub const SYSEX_END: u8 = 0xF7;
pub const FULL_FRAME_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("quarter-frame message must be 2 bytes, got {0}")]
    QuarterFrameLength(usize),
    #[error("quarter-frame data byte {0:#04x} has the high bit set")]
    QuarterFrameData(u8),
    #[error("full-frame message must be {FULL_FRAME_LEN} bytes, got {0}")]
    FullFrameLength(usize),
    #[error("full-frame message is not terminated by 0xF7")]
    Unterminated,
    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullFrame {
    pub components: Components,
    pub mtc_frame_rate: MtcFrameRate,
}

impl FullFrame {
    pub fn to_bytes(&self) -> [u8; FULL_FRAME_LEN] {
        let c = &self.components;
        [
            FULL_FRAME_HEADER[0],
            FULL_FRAME_HEADER[1],
            FULL_FRAME_HEADER[2],
            FULL_FRAME_HEADER[3],
            FULL_FRAME_HEADER[4],
            (self.mtc_frame_rate.bits() << 5) | (c.hours & 0x1F),
            c.minutes,
            c.seconds,
            c.frames,
            SYSEX_END,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuarterFrame {
    /// 0–7
    pub piece: u8,
    /// Low nibble only.
    pub value: u8,
}

impl QuarterFrame {
    /// Builds piece `piece` of the group describing `components` at `mtc_frame_rate`.
    pub fn from_components(piece: u8, components: &Components, mtc_frame_rate: MtcFrameRate) -> Self {
        let c = components;
        let piece = piece & 0x07;
        let value = match piece {
            0 => c.frames & 0x0F,
            1 => (c.frames >> 4) & 0x01,
            2 => c.seconds & 0x0F,
            3 => (c.seconds >> 4) & 0x03,
            4 => c.minutes & 0x0F,
            5 => (c.minutes >> 4) & 0x03,
            6 => c.hours & 0x0F,
            _ => (mtc_frame_rate.bits() << 1) | ((c.hours >> 4) & 0x01),
        };
        Self { piece, value }
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        [
            QUARTER_FRAME_STATUS,
            ((self.piece & 0x07) << 4) | (self.value & 0x0F),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtcMessage {
    FullFrame(FullFrame),
    QuarterFrame(QuarterFrame),
}

/// Parses a single complete message.
///
/// Returns `Ok(None)` for bytes that are not MTC at all (other channel or
/// SysEx traffic), and an error for MTC messages that are malformed.
pub fn parse(bytes: &[u8]) -> Result<Option<MtcMessage>, MessageError> {
    match bytes.first() {
        Some(&QUARTER_FRAME_STATUS) => parse_quarter_frame(bytes).map(Some),
        Some(_) if bytes.starts_with(&FULL_FRAME_HEADER) => parse_full_frame(bytes).map(Some),
        _ => Ok(None),
    }
}

fn parse_quarter_frame(bytes: &[u8]) -> Result<MtcMessage, MessageError> {
    if bytes.len() != 2 {
        return Err(MessageError::QuarterFrameLength(bytes.len()));
    }
    let data = bytes[1];
    if data & 0x80 != 0 {
        return Err(MessageError::QuarterFrameData(data));
    }
    Ok(MtcMessage::QuarterFrame(QuarterFrame {
        piece: (data >> 4) & 0x07,
        value: data & 0x0F,
    }))
}

fn parse_full_frame(bytes: &[u8]) -> Result<MtcMessage, MessageError> {
    if bytes.len() != FULL_FRAME_LEN {
        return Err(MessageError::FullFrameLength(bytes.len()));
    }
    if bytes[9] != SYSEX_END {
        return Err(MessageError::Unterminated);
    }

    let hour_byte = bytes[5];
    if hour_byte & 0x80 != 0 {
        return Err(MessageError::OutOfRange {
            field: "hours",
            value: hour_byte,
        });
    }
    // two bits, always a valid family
    let mtc_frame_rate = MtcFrameRate::from_bits((hour_byte >> 5) & 0x03)
        .ok_or(MessageError::OutOfRange {
            field: "rate",
            value: hour_byte,
        })?;
    let components = Components::new(hour_byte & 0x1F, bytes[6], bytes[7], bytes[8]);
    check_ranges(&components, mtc_frame_rate)?;

    Ok(MtcMessage::FullFrame(FullFrame {
        components,
        mtc_frame_rate,
    }))
}

/// Reassembles a complete quarter-frame group from the eight piece nibbles.
pub fn assemble_pieces(values: &[u8; 8]) -> Result<(Components, MtcFrameRate), MessageError> {
    let frames = (values[0] & 0x0F) | ((values[1] & 0x01) << 4);
    let seconds = (values[2] & 0x0F) | ((values[3] & 0x03) << 4);
    let minutes = (values[4] & 0x0F) | ((values[5] & 0x03) << 4);
    let hours = (values[6] & 0x0F) | ((values[7] & 0x01) << 4);
    let bits = (values[7] & 0b0110) >> 1;
    let mtc_frame_rate = MtcFrameRate::from_bits(bits).ok_or(MessageError::OutOfRange {
        field: "rate",
        value: values[7],
    })?;

    let components = Components::new(hours, minutes, seconds, frames);
    check_ranges(&components, mtc_frame_rate)?;
    Ok((components, mtc_frame_rate))
}

fn check_ranges(c: &Components, mtc_frame_rate: MtcFrameRate) -> Result<(), MessageError> {
    let fields = [
        ("hours", c.hours, 23),
        ("minutes", c.minutes, 59),
        ("seconds", c.seconds, 59),
        ("frames", c.frames, mtc_frame_rate.frame_count() as u8 - 1),
    ];
    for (field, value, max) in fields {
        if value > max {
            return Err(MessageError::OutOfRange { field, value });
        }
    }
    Ok(())
}
