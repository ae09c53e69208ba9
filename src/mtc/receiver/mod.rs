//! MTC receiver
//!
//! [`core::ReceiverCore`] holds the lock/drop-out state machine and is driven
//! purely by the bytes and timestamps handed to it. [`MtcReceiver`] runs a core
//! on its own sync thread together with a 200 Hz watchdog timer and publishes
//! what happens as [`ReceiverEvent`]s.

pub mod core;

use self::core::ReceiverCore;
use super::{Direction, MtcError, MtcFrameRate, TimecodeChange};
use crate::scheduler::{PeriodicTimer, Scheduler, ThreadScheduler};
use crate::state::Published;
use crate::timecode::{FrameRate, Timecode};
use crossbeam::channel::{self, select, Receiver, Sender, TrySendError};
use log::{debug, info, trace, warn};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Watchdog period while the receiver is active.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_millis(5);

/// Events held for a slow consumer before new ones are dropped.
pub const EVENT_CAPACITY: usize = 1024;

/// Upper bound for both policy values.
pub const MAX_POLICY_FRAMES: u32 = 100;

/// How quickly the receiver declares lock and how long it tolerates silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    lock_frames: u32,
    drop_out_frames: u32,
}

impl SyncPolicy {
    /// Values above [`MAX_POLICY_FRAMES`] are clamped.
    pub fn new(lock_frames: u32, drop_out_frames: u32) -> Self {
        Self {
            lock_frames: lock_frames.min(MAX_POLICY_FRAMES),
            drop_out_frames: drop_out_frames.min(MAX_POLICY_FRAMES),
        }
    }

    /// Consecutive continuous frames required before a lock is predicted.
    pub fn lock_frames(&self) -> u32 {
        self.lock_frames
    }

    /// Frames of quarter-frame silence before the receiver goes idle.
    pub fn drop_out_frames(&self) -> u32 {
        self.drop_out_frames
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::new(16, 10)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    #[default]
    Idle,
    /// Stream is continuous; lock is expected at the given time and position.
    PreSync {
        predicted_lock_time: Instant,
        lock_timecode: Timecode,
    },
    Sync,
    /// Receiving, but not (or no longer) continuous enough to be locked.
    Freewheeling,
    IncompatibleFrameRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverEvent {
    TimecodeChanged(TimecodeChange),
    StateChanged(ReceiverState),
}

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Used as the sync thread name.
    pub name: String,
    /// `None` reports positions at the incoming family's own rate.
    pub local_frame_rate: Option<FrameRate>,
    pub sync_policy: SyncPolicy,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            name: "mtc-receiver".to_string(),
            local_frame_rate: None,
            sync_policy: SyncPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    state: ReceiverState,
    timecode: Option<Timecode>,
    mtc_frame_rate: MtcFrameRate,
    direction: Direction,
    local_frame_rate: Option<FrameRate>,
    sync_policy: SyncPolicy,
    dropped_events: u64,
}

impl Snapshot {
    fn of(core: &ReceiverCore, dropped_events: u64) -> Self {
        Self {
            state: core.state(),
            timecode: core.timecode(),
            mtc_frame_rate: core.mtc_frame_rate(),
            direction: core.direction(),
            local_frame_rate: core.local_frame_rate(),
            sync_policy: core.sync_policy(),
            dropped_events,
        }
    }
}

enum Command {
    MidiIn(Vec<u8>, Instant),
    SetLocalFrameRate(Option<FrameRate>, Sender<()>),
    SetSyncPolicy(SyncPolicy, Sender<()>),
    Shutdown,
}

/// Receives MTC on a dedicated sync thread.
pub struct MtcReceiver {
    commands: Sender<Command>,
    events: Receiver<ReceiverEvent>,
    snapshot: Published<Snapshot>,
    thread: Option<JoinHandle<()>>,
}

impl MtcReceiver {
    pub fn new(config: ReceiverConfig) -> Result<Self, MtcError> {
        let core = ReceiverCore::new(config.local_frame_rate, config.sync_policy);
        let snapshot = Published::new(Snapshot::of(&core, 0));
        let (commands, command_rx) = channel::unbounded();
        let (event_tx, events) = channel::bounded(EVENT_CAPACITY);

        let sync = SyncThread {
            core,
            watchdog: PeriodicTimer::new(WATCHDOG_INTERVAL),
            pending: Vec::new(),
            events: event_tx,
            dropped_events: 0,
            snapshot: snapshot.clone(),
        };
        let thread = ThreadScheduler::new().spawn(&config.name, move || sync.run(command_rx))?;
        info!("MTC receiver '{}' created", config.name);

        Ok(Self {
            commands,
            events,
            snapshot,
            thread: Some(thread),
        })
    }

    /// Hands one complete inbound message to the sync thread. Never blocks.
    pub fn midi_in(&self, bytes: &[u8]) -> Result<(), MtcError> {
        send_midi_in(&self.commands, bytes)
    }

    /// A cloneable handle for feeding this receiver from other threads.
    pub fn input(&self) -> ReceiverInput {
        ReceiverInput {
            commands: self.commands.clone(),
        }
    }

    pub fn set_local_frame_rate(&self, frame_rate: Option<FrameRate>) -> Result<(), MtcError> {
        self.request(|reply| Command::SetLocalFrameRate(frame_rate, reply))
    }

    pub fn set_sync_policy(&self, policy: SyncPolicy) -> Result<(), MtcError> {
        self.request(|reply| Command::SetSyncPolicy(policy, reply))
    }

    /// Stream of position and state changes.
    ///
    /// Holds at most [`EVENT_CAPACITY`] unread events; later ones are
    /// dropped and counted in [`dropped_events`](Self::dropped_events).
    pub fn events(&self) -> Receiver<ReceiverEvent> {
        self.events.clone()
    }

    pub fn dropped_events(&self) -> u64 {
        self.snapshot.get().dropped_events
    }

    pub fn state(&self) -> ReceiverState {
        self.snapshot.get().state
    }

    pub fn timecode(&self) -> Option<Timecode> {
        self.snapshot.get().timecode
    }

    pub fn mtc_frame_rate(&self) -> MtcFrameRate {
        self.snapshot.get().mtc_frame_rate
    }

    pub fn direction(&self) -> Direction {
        self.snapshot.get().direction
    }

    pub fn local_frame_rate(&self) -> Option<FrameRate> {
        self.snapshot.get().local_frame_rate
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        self.snapshot.get().sync_policy
    }

    fn request<F>(&self, command: F) -> Result<(), MtcError>
    where
        F: FnOnce(Sender<()>) -> Command,
    {
        let (reply, response) = channel::bounded(1);
        self.commands
            .send(command(reply))
            .map_err(|_| MtcError::Disconnected)?;
        response.recv().map_err(|_| MtcError::Disconnected)
    }
}

/// Feeds inbound messages to an [`MtcReceiver`] from any thread.
///
/// Fails with [`MtcError::Disconnected`] once the receiver has been dropped.
#[derive(Clone)]
pub struct ReceiverInput {
    commands: Sender<Command>,
}

impl ReceiverInput {
    pub fn midi_in(&self, bytes: &[u8]) -> Result<(), MtcError> {
        send_midi_in(&self.commands, bytes)
    }
}

fn send_midi_in(commands: &Sender<Command>, bytes: &[u8]) -> Result<(), MtcError> {
    commands
        .send(Command::MidiIn(bytes.to_vec(), Instant::now()))
        .map_err(|_| MtcError::Disconnected)
}

impl Drop for MtcReceiver {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("MTC receiver thread panicked");
            }
        }
    }
}

struct SyncThread {
    core: ReceiverCore,
    watchdog: PeriodicTimer,
    pending: Vec<ReceiverEvent>,
    events: Sender<ReceiverEvent>,
    dropped_events: u64,
    snapshot: Published<Snapshot>,
}

impl SyncThread {
    fn run(mut self, commands: Receiver<Command>) {
        debug!("MTC receiver thread started");
        loop {
            let tick = self.watchdog.receiver();
            let mut reply = None;

            select! {
                recv(commands) -> command => match command {
                    Ok(Command::MidiIn(bytes, received_at)) => {
                        self.core.midi_in(&bytes, received_at, &mut self.pending);
                    }
                    Ok(Command::SetLocalFrameRate(frame_rate, ack)) => {
                        self.core.set_local_frame_rate(frame_rate);
                        reply = Some(ack);
                    }
                    Ok(Command::SetSyncPolicy(policy, ack)) => {
                        self.core.set_sync_policy(policy);
                        reply = Some(ack);
                    }
                    Ok(Command::Shutdown) | Err(_) => break,
                },
                recv(tick) -> _ => {
                    let now = Instant::now();
                    self.core.watchdog(now, &mut self.pending);
                    self.watchdog.advance(now);
                }
            }

            self.sync_watchdog();
            self.snapshot
                .set(Snapshot::of(&self.core, self.dropped_events));
            if self.publish_events() {
                self.snapshot
                    .set(Snapshot::of(&self.core, self.dropped_events));
            }
            if let Some(ack) = reply {
                let _ = ack.send(());
            }
        }
        debug!("MTC receiver thread stopped");
    }

    /// Sends pending events without blocking. Returns true if any were dropped.
    fn publish_events(&mut self) -> bool {
        let before = self.dropped_events;
        for event in self.pending.drain(..) {
            trace!("MTC receiver event {:?}", event);
            match self.events.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(event)) => {
                    self.dropped_events += 1;
                    if self.dropped_events.is_power_of_two() {
                        warn!(
                            "MTC receiver event queue full, {} events dropped (latest {:?})",
                            self.dropped_events, event
                        );
                    }
                }
            }
        }
        self.dropped_events != before
    }

    fn sync_watchdog(&mut self) {
        match (self.core.watchdog_running(), self.watchdog.is_running()) {
            (true, false) => self.watchdog.start(Instant::now() + WATCHDOG_INTERVAL),
            (false, true) => self.watchdog.stop(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtc::message::QuarterFrame;
    use crate::timecode::{Components, Timecode};
    use std::thread;

    #[test]
    fn test_policy_is_clamped() {
        let policy = SyncPolicy::new(150, 101);
        assert_eq!(policy.lock_frames(), 100);
        assert_eq!(policy.drop_out_frames(), 100);
        assert_eq!(SyncPolicy::default(), SyncPolicy::new(16, 10));
    }

    #[test]
    fn test_settings_are_acknowledged() {
        let receiver = MtcReceiver::new(ReceiverConfig::default()).unwrap();
        receiver
            .set_local_frame_rate(Some(FrameRate::Fps25))
            .unwrap();
        receiver.set_sync_policy(SyncPolicy::new(4, 8)).unwrap();

        assert_eq!(receiver.local_frame_rate(), Some(FrameRate::Fps25));
        assert_eq!(receiver.sync_policy(), SyncPolicy::new(4, 8));
        assert_eq!(receiver.state(), ReceiverState::Idle);
    }

    #[test]
    fn test_drops_out_to_idle_when_stream_stops() {
        let receiver = MtcReceiver::new(ReceiverConfig {
            local_frame_rate: Some(FrameRate::Fps30),
            ..ReceiverConfig::default()
        })
        .unwrap();
        let events = receiver.events();

        let components = Components::new(0, 0, 1, 0);
        for piece in 0..8 {
            let bytes =
                QuarterFrame::from_components(piece, &components, MtcFrameRate::Mtc30).to_bytes();
            receiver.midi_in(&bytes).unwrap();
        }

        let mut states = Vec::new();
        while let Ok(event) = events.recv_timeout(Duration::from_secs(2)) {
            if let ReceiverEvent::StateChanged(state) = event {
                states.push(state);
                if state == ReceiverState::Idle {
                    break;
                }
            }
        }
        assert_eq!(
            states,
            vec![ReceiverState::Freewheeling, ReceiverState::Idle]
        );
        thread::sleep(Duration::from_millis(10));
        assert_eq!(receiver.state(), ReceiverState::Idle);
        assert_eq!(receiver.timecode().unwrap().to_string(), "00:00:01:02");
    }

    #[test]
    fn test_unread_events_are_dropped_not_queued() {
        let receiver = MtcReceiver::new(ReceiverConfig {
            local_frame_rate: Some(FrameRate::Fps30),
            ..ReceiverConfig::default()
        })
        .unwrap();
        let events = receiver.events();

        let start = Timecode::zero(FrameRate::Fps30);
        for group in 0..300 {
            let components = start.adding_frames(group * 2).components();
            for piece in 0..8 {
                let bytes = QuarterFrame::from_components(piece, &components, MtcFrameRate::Mtc30)
                    .to_bytes();
                receiver.midi_in(&bytes).unwrap();
            }
        }
        // acknowledged only after every queued message has been handled
        receiver.set_sync_policy(SyncPolicy::default()).unwrap();

        assert_eq!(events.len(), EVENT_CAPACITY);
        assert!(receiver.dropped_events() > 0);

        // draining makes room again
        while events.try_recv().is_ok() {}
        let components = start.adding_frames(600).components();
        let bytes =
            QuarterFrame::from_components(0, &components, MtcFrameRate::Mtc30).to_bytes();
        receiver.midi_in(&bytes).unwrap();
        assert!(events.recv_timeout(Duration::from_secs(1)).is_ok());
    }
}
