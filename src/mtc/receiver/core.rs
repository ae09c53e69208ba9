use super::{ReceiverEvent, ReceiverState, SyncPolicy};
use crate::mtc::{DecoderEvent, Direction, MessageKind, MtcDecoder, MtcFrameRate, TimecodeChange};
use crate::timecode::{FrameRate, Timecode};
use log::{debug, info};
use std::time::{Duration, Instant};

/// Quarter-frame silence after which the assembly buffer is no longer trusted.
pub const QUARTER_FRAME_GAP: Duration = Duration::from_millis(50);

/// Frame rate used for drop-out timing when no local rate is set.
const FALLBACK_FRAME_RATE: FrameRate = FrameRate::Fps30;

/// Lock acquisition and drop-out supervision over a decoded MTC stream.
///
/// Time is always passed in, so the state machine can be driven by a real
/// watchdog timer or stepped deterministically.
#[derive(Debug, Clone)]
pub struct ReceiverCore {
    decoder: MtcDecoder,
    policy: SyncPolicy,
    state: ReceiverState,
    timecode: Option<Timecode>,
    last_quarter_frame_at: Option<Instant>,
    gap_handled: bool,
    consecutive_frames: u32,
    watchdog_running: bool,
}

impl ReceiverCore {
    pub fn new(local_frame_rate: Option<FrameRate>, policy: SyncPolicy) -> Self {
        Self {
            decoder: MtcDecoder::new(local_frame_rate),
            policy,
            state: ReceiverState::Idle,
            timecode: None,
            last_quarter_frame_at: None,
            gap_handled: false,
            consecutive_frames: 0,
            watchdog_running: false,
        }
    }

    /// Processes one inbound message received at `now`.
    pub fn midi_in(&mut self, bytes: &[u8], now: Instant, events: &mut Vec<ReceiverEvent>) {
        match self.decoder.midi_in(bytes) {
            None => {}
            Some(DecoderEvent::IncompatibleFrameRate {
                mtc_frame_rate,
                kind: MessageKind::QuarterFrame,
            }) => {
                self.quarter_frame_seen(now);
                self.consecutive_frames = 0;
                if self.state != ReceiverState::IncompatibleFrameRate {
                    info!(
                        "Incoming {} is not compatible with local rate {:?}",
                        mtc_frame_rate,
                        self.decoder.local_frame_rate()
                    );
                }
                self.set_state(ReceiverState::IncompatibleFrameRate, events);
            }
            Some(DecoderEvent::IncompatibleFrameRate {
                mtc_frame_rate,
                kind: MessageKind::FullFrame,
            }) => {
                debug!("Ignoring full-frame in incompatible {}", mtc_frame_rate);
            }
            Some(DecoderEvent::TimecodeChanged(change)) => match change.kind {
                MessageKind::FullFrame => self.full_frame(change, events),
                MessageKind::QuarterFrame => self.quarter_frame(change, now, events),
            },
        }
    }

    /// Periodic supervision: completes a pending lock and detects gaps.
    pub fn watchdog(&mut self, now: Instant, events: &mut Vec<ReceiverEvent>) {
        if !self.watchdog_running {
            return;
        }
        let Some(last) = self.last_quarter_frame_at else {
            return;
        };

        let gap = now.saturating_duration_since(last);
        if gap > self.drop_out_duration() {
            info!("MTC drop-out after {:?} without quarter-frames", gap);
            self.watchdog_running = false;
            self.last_quarter_frame_at = None;
            self.consecutive_frames = 0;
            self.decoder.reset_qf_buffer();
            self.set_state(ReceiverState::Idle, events);
            return;
        }

        if gap > QUARTER_FRAME_GAP {
            if !self.gap_handled {
                debug!("MTC quarter-frame gap of {:?}", gap);
                self.gap_handled = true;
                self.consecutive_frames = 0;
                self.decoder.reset_qf_buffer();
                if self.is_locking_or_locked() {
                    self.set_state(ReceiverState::Freewheeling, events);
                }
            }
            return;
        }

        if let ReceiverState::PreSync {
            predicted_lock_time,
            lock_timecode,
        } = self.state
        {
            let reached = self
                .timecode
                .and_then(|timecode| timecode.partial_cmp(&lock_timecode))
                .is_some_and(|ordering| ordering.is_ge());
            if now >= predicted_lock_time && reached {
                self.set_state(ReceiverState::Sync, events);
            }
        }
    }

    /// Whether the watchdog timer needs to keep firing.
    pub fn watchdog_running(&self) -> bool {
        self.watchdog_running
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Last accepted position.
    pub fn timecode(&self) -> Option<Timecode> {
        self.timecode
    }

    pub fn direction(&self) -> Direction {
        self.decoder.direction()
    }

    pub fn mtc_frame_rate(&self) -> MtcFrameRate {
        self.decoder.mtc_frame_rate()
    }

    pub fn local_frame_rate(&self) -> Option<FrameRate> {
        self.decoder.local_frame_rate()
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        self.policy
    }

    pub fn set_local_frame_rate(&mut self, frame_rate: Option<FrameRate>) {
        self.decoder.set_local_frame_rate(frame_rate);
        self.consecutive_frames = 0;
    }

    pub fn set_sync_policy(&mut self, policy: SyncPolicy) {
        self.policy = policy;
    }

    fn full_frame(&mut self, change: TimecodeChange, events: &mut Vec<ReceiverEvent>) {
        if self.state == ReceiverState::IncompatibleFrameRate {
            return;
        }
        self.consecutive_frames = 0;
        self.timecode = Some(change.timecode);
        events.push(ReceiverEvent::TimecodeChanged(change));
    }

    fn quarter_frame(
        &mut self,
        change: TimecodeChange,
        now: Instant,
        events: &mut Vec<ReceiverEvent>,
    ) {
        self.quarter_frame_seen(now);
        if matches!(
            self.state,
            ReceiverState::Idle | ReceiverState::IncompatibleFrameRate
        ) {
            self.set_state(ReceiverState::Freewheeling, events);
        }

        if change.display_needs_update {
            let continuous = change.direction == Direction::Forward
                && self
                    .timecode
                    .is_some_and(|previous| is_next_frame(&previous, &change.timecode));

            if continuous {
                self.consecutive_frames += 1;
            } else {
                self.consecutive_frames = 0;
                if self.is_locking_or_locked() {
                    debug!("MTC position jumped to {}", change.timecode);
                    self.set_state(ReceiverState::Freewheeling, events);
                }
            }

            if self.state == ReceiverState::Freewheeling
                && self.consecutive_frames >= self.policy.lock_frames()
            {
                let lock_frames = self.policy.lock_frames();
                let frame_rate = change.timecode.frame_rate();
                self.set_state(
                    ReceiverState::PreSync {
                        predicted_lock_time: now + frame_rate.frames_duration(lock_frames),
                        lock_timecode: change.timecode.adding_frames(i64::from(lock_frames)),
                    },
                    events,
                );
            }
        }

        self.timecode = Some(change.timecode);
        events.push(ReceiverEvent::TimecodeChanged(change));
    }

    fn quarter_frame_seen(&mut self, now: Instant) {
        self.last_quarter_frame_at = Some(now);
        self.gap_handled = false;
        self.watchdog_running = true;
    }

    fn is_locking_or_locked(&self) -> bool {
        matches!(
            self.state,
            ReceiverState::PreSync { .. } | ReceiverState::Sync
        )
    }

    fn drop_out_duration(&self) -> Duration {
        self.decoder
            .local_frame_rate()
            .unwrap_or(FALLBACK_FRAME_RATE)
            .frames_duration(self.policy.drop_out_frames())
    }

    fn set_state(&mut self, state: ReceiverState, events: &mut Vec<ReceiverEvent>) {
        if self.state == state {
            return;
        }
        debug!("MTC receiver state {:?} -> {:?}", self.state, state);
        self.state = state;
        events.push(ReceiverEvent::StateChanged(state));
    }
}

fn is_next_frame(previous: &Timecode, current: &Timecode) -> bool {
    previous.frame_rate() == current.frame_rate()
        && previous.without_subframes().adding_frames(1) == current.without_subframes()
}
