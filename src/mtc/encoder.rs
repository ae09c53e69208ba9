use super::message::{FullFrame, QuarterFrame};
use super::{FullFrameBehavior, MidiOutHandler, MtcError, MtcFrameRate};
use crate::timecode::{Components, FrameRate, Timecode};
use log::{debug, trace};

/// Turns a local timecode position into an outgoing MTC byte stream.
///
/// The position is held in MTC family units: an even base frame for the
/// current quarter-frame group plus the index (0–7) of the next piece to send.
/// Callers advance it with [`increment`](Self::increment) and
/// [`decrement`](Self::decrement) at quarter-frame rate.
pub struct MtcEncoder {
    /// Group position at the family's direct-equivalent rate.
    position: Timecode,
    quarter_frame: u8,
    mtc_frame_rate: MtcFrameRate,
    local_frame_rate: FrameRate,
    stream_started: bool,
    last_full_frame: Option<FullFrame>,
    midi_out: Option<MidiOutHandler>,
}

impl MtcEncoder {
    pub fn new(local_frame_rate: FrameRate) -> Self {
        let mtc_frame_rate = local_frame_rate.mtc_frame_rate();
        Self {
            position: Timecode::zero(mtc_frame_rate.direct_equivalent()),
            quarter_frame: 0,
            mtc_frame_rate,
            local_frame_rate,
            stream_started: false,
            last_full_frame: None,
            midi_out: None,
        }
    }

    pub fn set_midi_out_handler(&mut self, handler: MidiOutHandler) {
        self.midi_out = Some(handler);
    }

    /// Changes the local rate and, with it, the transmitted family.
    ///
    /// When the family changes the current position is re-expressed in the new
    /// family: frames clamp to its last group and skipped drop-frame numbers
    /// move on to the next valid frame.
    pub fn set_local_frame_rate(&mut self, frame_rate: FrameRate) -> Result<(), MtcError> {
        let mtc_frame_rate = frame_rate.mtc_frame_rate();
        if mtc_frame_rate != self.mtc_frame_rate {
            self.position = regroup(self.position.components(), mtc_frame_rate)?;
            self.last_full_frame = None;
        }
        self.local_frame_rate = frame_rate;
        self.mtc_frame_rate = mtc_frame_rate;
        Ok(())
    }

    /// Moves to `timecode`, optionally announcing it with a full-frame message.
    ///
    /// The timecode's rate must be compatible with the local rate; it becomes
    /// the new local rate. Subframes are discarded. The next
    /// `increment`/`decrement` re-emits the piece for the new position.
    pub fn locate(
        &mut self,
        timecode: &Timecode,
        full_frame: FullFrameBehavior,
    ) -> Result<(), MtcError> {
        let frame_rate = timecode.frame_rate();
        if !frame_rate.is_compatible(self.local_frame_rate) {
            return Err(MtcError::IncompatibleFrameRate {
                local: self.local_frame_rate,
                mtc: frame_rate.mtc_frame_rate(),
            });
        }

        let (raw_frames, quarter_frame) = frame_rate.mtc_scaled_frames(f64::from(timecode.frames()));
        let mtc_frame_rate = frame_rate.mtc_frame_rate();
        let components = Components::new(
            timecode.hours(),
            timecode.minutes(),
            timecode.seconds(),
            raw_frames as u8,
        );
        self.position = Timecode::new(components, mtc_frame_rate.direct_equivalent())?;
        self.quarter_frame = quarter_frame;
        self.local_frame_rate = frame_rate;
        self.mtc_frame_rate = mtc_frame_rate;
        self.stream_started = false;
        debug!(
            "MTC encoder located to {} ({} group {} piece {})",
            timecode, mtc_frame_rate, self.position, quarter_frame
        );

        match full_frame {
            FullFrameBehavior::Always => self.send_full_frame(),
            FullFrameBehavior::IfDifferent => {
                if self.last_full_frame != Some(self.full_frame()) {
                    self.send_full_frame();
                }
            }
            FullFrameBehavior::Never => {}
        }
        Ok(())
    }

    /// Advances one quarter-frame forward and emits it.
    pub fn increment(&mut self) {
        if !self.stream_started {
            self.stream_started = true;
        } else if self.quarter_frame == 7 {
            self.quarter_frame = 0;
            self.position = self.position.adding_frames(2);
        } else {
            self.quarter_frame += 1;
        }
        self.send_quarter_frame();
    }

    /// Steps one quarter-frame backward and emits it.
    pub fn decrement(&mut self) {
        if !self.stream_started {
            self.stream_started = true;
        } else if self.quarter_frame == 0 {
            self.quarter_frame = 7;
            self.position = self.position.adding_frames(-2);
        } else {
            self.quarter_frame -= 1;
        }
        self.send_quarter_frame();
    }

    /// Sends a full-frame message for the current position.
    pub fn send_full_frame(&mut self) {
        let full_frame = self.full_frame();
        trace!("MTC full-frame {:?}", full_frame);
        self.emit(&full_frame.to_bytes());
        self.last_full_frame = Some(full_frame);
    }

    /// Current position scaled to the local frame rate.
    pub fn timecode(&self) -> Result<Timecode, MtcError> {
        self.mtc_frame_rate.scaled_timecode(
            self.position.components(),
            self.quarter_frame,
            self.local_frame_rate,
        )
    }

    /// Group position in MTC family units.
    pub fn mtc_components(&self) -> Components {
        self.position.components()
    }

    pub fn quarter_frame(&self) -> u8 {
        self.quarter_frame
    }

    pub fn mtc_frame_rate(&self) -> MtcFrameRate {
        self.mtc_frame_rate
    }

    pub fn local_frame_rate(&self) -> FrameRate {
        self.local_frame_rate
    }

    fn full_frame(&self) -> FullFrame {
        FullFrame {
            components: self
                .position
                .adding_frames(i64::from(self.quarter_frame / 4))
                .components(),
            mtc_frame_rate: self.mtc_frame_rate,
        }
    }

    fn send_quarter_frame(&mut self) {
        let quarter_frame = QuarterFrame::from_components(
            self.quarter_frame,
            &self.position.components(),
            self.mtc_frame_rate,
        );
        self.last_full_frame = None;
        self.emit(&quarter_frame.to_bytes());
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Some(handler) = self.midi_out.as_mut() {
            handler(bytes);
        }
    }
}

/// Moves a group position into another family. Frames are clamped to the
/// family's last group; a frame number the family drops moves on to the
/// first one that exists.
fn regroup(mut components: Components, mtc_frame_rate: MtcFrameRate) -> Result<Timecode, MtcError> {
    let frame_rate = mtc_frame_rate.direct_equivalent();
    let last_group = (mtc_frame_rate.frame_count() as u8 - 1) & !1;
    components.frames = components.frames.min(last_group);
    if components.seconds == 0 && components.minutes % 10 != 0 {
        components.frames = components
            .frames
            .max(frame_rate.dropped_frames_per_minute() as u8);
    }
    Ok(Timecode::new(components, frame_rate)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_encoder(rate: FrameRate) -> (MtcEncoder, Arc<Mutex<Vec<Vec<u8>>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        let mut encoder = MtcEncoder::new(rate);
        encoder.set_midi_out_handler(Box::new(move |bytes| {
            sink.lock().unwrap().push(bytes.to_vec());
        }));
        (encoder, sent)
    }

    fn tc(s: &str, rate: FrameRate) -> Timecode {
        Timecode::parse(s, rate).unwrap()
    }

    #[test]
    fn test_locate_sends_full_frame() {
        let (mut encoder, sent) = recording_encoder(FrameRate::Fps24);
        encoder
            .locate(&tc("01:02:03:04", FrameRate::Fps24), FullFrameBehavior::Always)
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(
            sent[0],
            vec![0xF0, 0x7F, 0x7F, 0x01, 0x01, 0x01, 0x02, 0x03, 0x04, 0xF7]
        );
    }

    #[test]
    fn test_locate_scales_into_quarter_frames() {
        let (mut encoder, _) = recording_encoder(FrameRate::Fps30);
        encoder
            .locate(&tc("00:00:00:15", FrameRate::Fps30), FullFrameBehavior::Never)
            .unwrap();
        assert_eq!(encoder.mtc_components().frames, 14);
        assert_eq!(encoder.quarter_frame(), 4);
        assert_eq!(encoder.timecode().unwrap(), tc("00:00:00:15", FrameRate::Fps30));

        encoder
            .locate(&tc("00:00:00:31", FrameRate::Fps60), FullFrameBehavior::Never)
            .unwrap();
        assert_eq!(encoder.local_frame_rate(), FrameRate::Fps60);
        assert_eq!(encoder.mtc_frame_rate(), MtcFrameRate::Mtc30);
        assert_eq!(encoder.mtc_components().frames, 14);
        assert_eq!(encoder.quarter_frame(), 6);
        assert_eq!(encoder.timecode().unwrap(), tc("00:00:00:31", FrameRate::Fps60));
    }

    #[test]
    fn test_full_frame_behaviors() {
        let (mut encoder, sent) = recording_encoder(FrameRate::Fps25);
        let position = tc("00:10:00:00", FrameRate::Fps25);

        encoder.locate(&position, FullFrameBehavior::IfDifferent).unwrap();
        encoder.locate(&position, FullFrameBehavior::IfDifferent).unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);

        encoder.locate(&position, FullFrameBehavior::Always).unwrap();
        assert_eq!(sent.lock().unwrap().len(), 2);

        encoder.locate(&position, FullFrameBehavior::Never).unwrap();
        assert_eq!(sent.lock().unwrap().len(), 2);

        // any quarter-frame invalidates the last full-frame
        encoder.increment();
        encoder.locate(&position, FullFrameBehavior::IfDifferent).unwrap();
        assert_eq!(sent.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_locate_incompatible_rate_fails() {
        let (mut encoder, sent) = recording_encoder(FrameRate::Fps30);
        let result = encoder.locate(&tc("00:00:01:00", FrameRate::Fps25), FullFrameBehavior::Always);
        assert!(matches!(result, Err(MtcError::IncompatibleFrameRate { .. })));
        assert!(sent.lock().unwrap().is_empty());
        assert_eq!(encoder.local_frame_rate(), FrameRate::Fps30);
    }

    #[test]
    fn test_first_increment_re_emits_current_piece() {
        let (mut encoder, sent) = recording_encoder(FrameRate::Fps30);
        encoder
            .locate(&tc("01:00:00:00", FrameRate::Fps30), FullFrameBehavior::Never)
            .unwrap();
        for _ in 0..8 {
            encoder.increment();
        }

        let sent = sent.lock().unwrap();
        let pieces: Vec<u8> = sent.iter().map(|msg| msg[1] >> 4).collect();
        assert_eq!(pieces, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        // 0rrh for 30 fps, hour 1 has no bit 4
        assert_eq!(sent[7], vec![0xF1, 0x76]);
        assert_eq!(sent[6], vec![0xF1, 0x61]);
    }

    #[test]
    fn test_increment_wraps_at_midnight() {
        let (mut encoder, _) = recording_encoder(FrameRate::Fps30);
        encoder
            .locate(&tc("23:59:59:28", FrameRate::Fps30), FullFrameBehavior::Never)
            .unwrap();
        for _ in 0..9 {
            encoder.increment();
        }
        assert_eq!(encoder.mtc_components(), Components::new(0, 0, 0, 0));
        assert_eq!(encoder.quarter_frame(), 0);
    }

    #[test]
    fn test_decrement_crosses_group_boundary() {
        let (mut encoder, sent) = recording_encoder(FrameRate::Fps30);
        encoder
            .locate(&tc("00:00:01:00", FrameRate::Fps30), FullFrameBehavior::Never)
            .unwrap();
        encoder.decrement();
        encoder.decrement();

        assert_eq!(encoder.mtc_components(), Components::new(0, 0, 0, 28));
        assert_eq!(encoder.quarter_frame(), 7);
        let sent = sent.lock().unwrap();
        assert_eq!(sent[0][1] >> 4, 0);
        assert_eq!(sent[1][1] >> 4, 7);
    }

    #[test]
    fn test_drop_frame_group_advance() {
        let (mut encoder, _) = recording_encoder(FrameRate::Fps29_97Drop);
        encoder
            .locate(&tc("00:00:59;28", FrameRate::Fps29_97Drop), FullFrameBehavior::Never)
            .unwrap();
        for _ in 0..9 {
            encoder.increment();
        }
        assert_eq!(encoder.mtc_components(), Components::new(0, 1, 0, 2));
    }

    #[test]
    fn test_full_frame_includes_quarter_frame_offset() {
        let (mut encoder, sent) = recording_encoder(FrameRate::Fps30);
        encoder
            .locate(&tc("00:00:00:15", FrameRate::Fps30), FullFrameBehavior::Always)
            .unwrap();
        assert_eq!(sent.lock().unwrap()[0][8], 15);
    }

    #[test]
    fn test_rate_change_skips_dropped_frame_numbers() {
        let (mut encoder, _) = recording_encoder(FrameRate::Fps30);
        encoder
            .locate(&tc("00:01:00:00", FrameRate::Fps30), FullFrameBehavior::Never)
            .unwrap();
        encoder.set_local_frame_rate(FrameRate::Fps29_97Drop).unwrap();
        assert_eq!(encoder.mtc_components(), Components::new(0, 1, 0, 2));
        assert_eq!(encoder.mtc_frame_rate(), MtcFrameRate::Mtc2997Drop);

        // tenth minutes keep frame 0
        encoder.set_local_frame_rate(FrameRate::Fps30).unwrap();
        encoder
            .locate(&tc("00:10:00:00", FrameRate::Fps30), FullFrameBehavior::Never)
            .unwrap();
        encoder.set_local_frame_rate(FrameRate::Fps29_97Drop).unwrap();
        assert_eq!(encoder.mtc_components(), Components::new(0, 10, 0, 0));
    }

    #[test]
    fn test_rate_change_clamps_to_last_group() {
        let (mut encoder, _) = recording_encoder(FrameRate::Fps30);
        encoder
            .locate(&tc("00:00:05:28", FrameRate::Fps30), FullFrameBehavior::Never)
            .unwrap();
        encoder.set_local_frame_rate(FrameRate::Fps24).unwrap();
        assert_eq!(encoder.mtc_components(), Components::new(0, 0, 5, 22));
    }
}
