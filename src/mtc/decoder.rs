use super::message::{self, FullFrame, MtcMessage, QuarterFrame};
use super::{Direction, MessageKind, MtcFrameRate};
use crate::timecode::{FrameRate, Timecode};
use log::{debug, trace};

/// A position recovered from the incoming stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimecodeChange {
    pub timecode: Timecode,
    pub kind: MessageKind,
    pub direction: Direction,
    /// Whether the frame-level position differs from the last one reported.
    pub display_needs_update: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderEvent {
    TimecodeChanged(TimecodeChange),
    /// A message arrived in a family the local frame rate cannot represent.
    IncompatibleFrameRate {
        mtc_frame_rate: MtcFrameRate,
        kind: MessageKind,
    },
}

/// Reassembles MTC messages into timecode positions.
///
/// Quarter-frames are collected into eight slots. Once a complete group has
/// been seen, every further quarter-frame yields a position; crossing a group
/// boundary in either direction moves the group by two frames.
#[derive(Debug, Clone)]
pub struct MtcDecoder {
    pieces: [Option<u8>; 8],
    /// Current group base at the family's direct-equivalent rate.
    group: Option<Timecode>,
    last_piece: Option<u8>,
    direction: Direction,
    mtc_frame_rate: MtcFrameRate,
    local_frame_rate: Option<FrameRate>,
    timecode: Option<Timecode>,
}

impl Default for MtcDecoder {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MtcDecoder {
    pub fn new(local_frame_rate: Option<FrameRate>) -> Self {
        Self {
            pieces: [None; 8],
            group: None,
            last_piece: None,
            direction: Direction::Forward,
            mtc_frame_rate: local_frame_rate
                .map(|rate| rate.mtc_frame_rate())
                .unwrap_or(MtcFrameRate::Mtc30),
            local_frame_rate,
            timecode: None,
        }
    }

    /// Feeds one complete inbound message.
    ///
    /// Non-MTC traffic is ignored. Malformed MTC is discarded and clears the
    /// quarter-frame buffer.
    pub fn midi_in(&mut self, bytes: &[u8]) -> Option<DecoderEvent> {
        match message::parse(bytes) {
            Ok(Some(MtcMessage::FullFrame(full_frame))) => self.full_frame(full_frame),
            Ok(Some(MtcMessage::QuarterFrame(quarter_frame))) => self.quarter_frame(quarter_frame),
            Ok(None) => None,
            Err(e) => {
                debug!("Discarding malformed MTC message {:02X?}: {}", bytes, e);
                self.reset_qf_buffer();
                None
            }
        }
    }

    /// Forgets any partially or fully assembled quarter-frame group.
    pub fn reset_qf_buffer(&mut self) {
        self.pieces = [None; 8];
        self.group = None;
        self.last_piece = None;
    }

    /// Sets the rate positions are scaled to. `None` reports positions at the
    /// incoming family's direct-equivalent rate.
    pub fn set_local_frame_rate(&mut self, frame_rate: Option<FrameRate>) {
        self.local_frame_rate = frame_rate;
        self.timecode = None;
    }

    pub fn local_frame_rate(&self) -> Option<FrameRate> {
        self.local_frame_rate
    }

    /// Family of the most recently received group or full-frame.
    pub fn mtc_frame_rate(&self) -> MtcFrameRate {
        self.mtc_frame_rate
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Last position reported.
    pub fn timecode(&self) -> Option<Timecode> {
        self.timecode
    }

    fn full_frame(&mut self, full_frame: FullFrame) -> Option<DecoderEvent> {
        self.mtc_frame_rate = full_frame.mtc_frame_rate;
        let Some(target) = self.target_frame_rate(full_frame.mtc_frame_rate) else {
            return Some(DecoderEvent::IncompatibleFrameRate {
                mtc_frame_rate: full_frame.mtc_frame_rate,
                kind: MessageKind::FullFrame,
            });
        };

        match full_frame
            .mtc_frame_rate
            .scaled_timecode(full_frame.components, 0, target)
        {
            Ok(timecode) => Some(self.publish(timecode, MessageKind::FullFrame)),
            Err(e) => {
                debug!("Discarding full-frame {:?}: {}", full_frame, e);
                self.reset_qf_buffer();
                None
            }
        }
    }

    fn quarter_frame(&mut self, quarter_frame: QuarterFrame) -> Option<DecoderEvent> {
        let piece = quarter_frame.piece;
        match self.last_piece {
            Some(last) if piece == (last + 1) % 8 => {
                self.direction = Direction::Forward;
                if piece == 0 {
                    self.shift_group(2);
                }
            }
            Some(last) if piece == (last + 7) % 8 => {
                self.direction = Direction::Backward;
                if piece == 7 {
                    self.shift_group(-2);
                }
            }
            Some(last) => {
                trace!("MTC quarter-frame discontinuity: piece {} after {}", piece, last);
                self.pieces = [None; 8];
                self.group = None;
            }
            None => {}
        }
        self.last_piece = Some(piece);
        self.pieces[usize::from(piece)] = Some(quarter_frame.value);

        if self.pieces.iter().all(Option::is_some) && !self.assemble_group() {
            return None;
        }

        let group = self.group?;
        let mtc_frame_rate = group.frame_rate().mtc_frame_rate();
        let Some(target) = self.target_frame_rate(mtc_frame_rate) else {
            return Some(DecoderEvent::IncompatibleFrameRate {
                mtc_frame_rate,
                kind: MessageKind::QuarterFrame,
            });
        };

        // completing a group forward displays two frames on
        let offset = if self.direction == Direction::Forward && piece == 7 {
            8
        } else {
            piece
        };
        match mtc_frame_rate.scaled_timecode(group.components(), offset, target) {
            Ok(timecode) => Some(self.publish(timecode, MessageKind::QuarterFrame)),
            Err(e) => {
                debug!("Discarding quarter-frame position: {}", e);
                None
            }
        }
    }

    /// Decodes the eight filled slots into the current group. Returns false
    /// when the group was malformed and the buffer has been reset.
    fn assemble_group(&mut self) -> bool {
        let mut values = [0u8; 8];
        for (value, piece) in values.iter_mut().zip(self.pieces) {
            *value = piece.unwrap_or_default();
        }

        let assembled = message::assemble_pieces(&values).and_then(|(components, rate)| {
            Timecode::new(components, rate.direct_equivalent())
                .map(|group| (group, rate))
                .map_err(|_| message::MessageError::OutOfRange {
                    field: "frames",
                    value: components.frames,
                })
        });
        match assembled {
            Ok((group, mtc_frame_rate)) => {
                self.group = Some(group);
                self.mtc_frame_rate = mtc_frame_rate;
                true
            }
            Err(e) => {
                debug!("Discarding malformed MTC quarter-frame group: {}", e);
                self.reset_qf_buffer();
                false
            }
        }
    }

    fn shift_group(&mut self, frames: i64) {
        self.group = self.group.map(|group| group.adding_frames(frames));
        self.pieces = [None; 8];
    }

    fn target_frame_rate(&self, mtc_frame_rate: MtcFrameRate) -> Option<FrameRate> {
        match self.local_frame_rate {
            Some(local) if local.transmits_mtc(mtc_frame_rate) => Some(local),
            Some(_) => None,
            None => Some(mtc_frame_rate.direct_equivalent()),
        }
    }

    fn publish(&mut self, timecode: Timecode, kind: MessageKind) -> DecoderEvent {
        let display_needs_update = self
            .timecode
            .map_or(true, |last| last.components() != timecode.components());
        self.timecode = Some(timecode);
        DecoderEvent::TimecodeChanged(TimecodeChange {
            timecode,
            kind,
            direction: self.direction,
            display_needs_update,
        })
    }
}
