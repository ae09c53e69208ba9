use super::{FullFrameBehavior, MidiOutHandler, MtcEncoder, MtcError, MtcFrameRate};
use crate::scheduler::{PeriodicTimer, Scheduler, ThreadScheduler};
use crate::state::Published;
use crate::timecode::{FrameRate, Timecode, SUBFRAMES_PER_FRAME};
use crossbeam::channel::{self, select, Receiver, Sender};
use log::{debug, info, warn};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Used as the sync thread name.
    pub name: String,
    pub local_frame_rate: FrameRate,
    pub full_frame_behavior: FullFrameBehavior,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            name: "mtc-generator".to_string(),
            local_frame_rate: FrameRate::Fps30,
            full_frame_behavior: FullFrameBehavior::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorState {
    #[default]
    Idle,
    Generating,
}

#[derive(Debug, Clone)]
struct Snapshot {
    state: GeneratorState,
    timecode: Timecode,
    local_frame_rate: FrameRate,
    mtc_frame_rate: MtcFrameRate,
    full_frame_behavior: FullFrameBehavior,
}

type Reply = Sender<Result<(), MtcError>>;

enum Command {
    Start(Reply),
    StartAt(Timecode, Reply),
    Locate(Timecode, Reply),
    Stop(Reply),
    SetLocalFrameRate(FrameRate, Reply),
    SetFullFrameBehavior(FullFrameBehavior, Reply),
    Shutdown,
}

/// Transmits MTC at the local frame rate from a dedicated sync thread.
///
/// All control calls are acknowledged by the sync thread before they return.
pub struct MtcGenerator {
    commands: Sender<Command>,
    snapshot: Published<Snapshot>,
    thread: Option<JoinHandle<()>>,
}

impl MtcGenerator {
    pub fn new(config: GeneratorConfig, midi_out: MidiOutHandler) -> Result<Self, MtcError> {
        let mut encoder = MtcEncoder::new(config.local_frame_rate);
        encoder.set_midi_out_handler(midi_out);

        let snapshot = Published::new(Snapshot {
            state: GeneratorState::Idle,
            timecode: Timecode::zero(config.local_frame_rate),
            local_frame_rate: config.local_frame_rate,
            mtc_frame_rate: config.local_frame_rate.mtc_frame_rate(),
            full_frame_behavior: config.full_frame_behavior,
        });

        let (commands, command_rx) = channel::unbounded();
        let sync = SyncThread {
            timer: PeriodicTimer::new(config.local_frame_rate.mtc_quarter_frame_duration()),
            encoder,
            state: GeneratorState::Idle,
            full_frame_behavior: config.full_frame_behavior,
            pending_start: None,
            snapshot: snapshot.clone(),
        };
        let thread = ThreadScheduler::new().spawn(&config.name, move || sync.run(command_rx))?;
        info!("MTC generator '{}' created at {}", config.name, config.local_frame_rate);

        Ok(Self {
            commands,
            snapshot,
            thread: Some(thread),
        })
    }

    /// Starts transmitting from the current position.
    pub fn start(&self) -> Result<(), MtcError> {
        self.request(Command::Start)
    }

    /// Adopts the timecode's frame rate, locates to it and starts.
    ///
    /// A timecode with subframes starts at the beginning of the following frame.
    pub fn start_at(&self, timecode: Timecode) -> Result<(), MtcError> {
        self.request(|reply| Command::StartAt(timecode, reply))
    }

    pub fn locate(&self, timecode: Timecode) -> Result<(), MtcError> {
        self.request(|reply| Command::Locate(timecode, reply))
    }

    /// Stops transmitting; also cancels a start scheduled by `start_at`.
    pub fn stop(&self) -> Result<(), MtcError> {
        self.request(Command::Stop)
    }

    pub fn set_local_frame_rate(&self, frame_rate: FrameRate) -> Result<(), MtcError> {
        self.request(|reply| Command::SetLocalFrameRate(frame_rate, reply))
    }

    pub fn set_full_frame_behavior(&self, behavior: FullFrameBehavior) -> Result<(), MtcError> {
        self.request(|reply| Command::SetFullFrameBehavior(behavior, reply))
    }

    pub fn state(&self) -> GeneratorState {
        self.snapshot.get().state
    }

    /// Position at the local frame rate, as of the last quarter-frame sent.
    pub fn timecode(&self) -> Timecode {
        self.snapshot.get().timecode
    }

    pub fn local_frame_rate(&self) -> FrameRate {
        self.snapshot.get().local_frame_rate
    }

    pub fn mtc_frame_rate(&self) -> MtcFrameRate {
        self.snapshot.get().mtc_frame_rate
    }

    pub fn full_frame_behavior(&self) -> FullFrameBehavior {
        self.snapshot.get().full_frame_behavior
    }

    fn request<F>(&self, command: F) -> Result<(), MtcError>
    where
        F: FnOnce(Reply) -> Command,
    {
        let (reply, response) = channel::bounded(1);
        self.commands
            .send(command(reply))
            .map_err(|_| MtcError::Disconnected)?;
        response.recv().map_err(|_| MtcError::Disconnected)?
    }
}

impl Drop for MtcGenerator {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("MTC generator thread panicked");
            }
        }
    }
}

struct SyncThread {
    encoder: MtcEncoder,
    timer: PeriodicTimer,
    state: GeneratorState,
    full_frame_behavior: FullFrameBehavior,
    pending_start: Option<(Instant, Timecode)>,
    snapshot: Published<Snapshot>,
}

impl SyncThread {
    fn run(mut self, commands: Receiver<Command>) {
        debug!("MTC generator thread started");
        loop {
            let tick = self.timer.receiver();
            let pending = match self.pending_start {
                Some((at, _)) => channel::at(at),
                None => channel::never(),
            };

            select! {
                recv(commands) -> command => match command {
                    Ok(Command::Shutdown) | Err(_) => break,
                    Ok(command) => {
                        let reply = self.handle(command);
                        // acknowledge only once the new state is readable
                        self.publish();
                        if let Some((reply, result)) = reply {
                            let _ = reply.send(result);
                        }
                        continue;
                    }
                },
                recv(tick) -> _ => {
                    self.encoder.increment();
                    self.timer.advance(Instant::now());
                }
                recv(pending) -> _ => {
                    if let Some((_, timecode)) = self.pending_start.take() {
                        self.begin_at(&timecode);
                    }
                }
            }
            self.publish();
        }
        debug!("MTC generator thread stopped");
    }

    fn handle(&mut self, command: Command) -> Option<(Reply, Result<(), MtcError>)> {
        match command {
            Command::Start(reply) => {
                self.start();
                Some((reply, Ok(())))
            }
            Command::StartAt(timecode, reply) => {
                let result = self.start_at(timecode);
                Some((reply, result))
            }
            Command::Locate(timecode, reply) => {
                let result = self.encoder.locate(&timecode, self.full_frame_behavior);
                self.sync_period();
                Some((reply, result))
            }
            Command::Stop(reply) => {
                self.stop();
                Some((reply, Ok(())))
            }
            Command::SetLocalFrameRate(frame_rate, reply) => {
                let result = self.encoder.set_local_frame_rate(frame_rate);
                self.sync_period();
                Some((reply, result))
            }
            Command::SetFullFrameBehavior(behavior, reply) => {
                self.full_frame_behavior = behavior;
                Some((reply, Ok(())))
            }
            Command::Shutdown => None,
        }
    }

    fn start(&mut self) {
        self.pending_start = None;
        if self.state == GeneratorState::Generating {
            return;
        }
        self.state = GeneratorState::Generating;
        self.timer.start(Instant::now());
        info!("MTC generator started at {}", self.encoder.local_frame_rate());
    }

    fn start_at(&mut self, timecode: Timecode) -> Result<(), MtcError> {
        self.encoder.set_local_frame_rate(timecode.frame_rate())?;
        self.sync_period();

        if timecode.subframes() == 0 {
            self.begin_at(&timecode);
            return Ok(());
        }

        let remaining = u32::from(SUBFRAMES_PER_FRAME - timecode.subframes());
        let delay: Duration =
            timecode.frame_rate().frame_duration() * remaining / u32::from(SUBFRAMES_PER_FRAME);
        let next_frame = timecode.without_subframes().adding_frames(1);
        debug!("MTC generator scheduled to start at {} in {:?}", next_frame, delay);
        self.timer.stop();
        self.state = GeneratorState::Idle;
        self.pending_start = Some((Instant::now() + delay, next_frame));
        Ok(())
    }

    fn begin_at(&mut self, timecode: &Timecode) {
        if let Err(e) = self.encoder.locate(timecode, FullFrameBehavior::Always) {
            warn!("MTC generator could not locate to {}: {}", timecode, e);
            return;
        }
        self.timer.stop();
        self.state = GeneratorState::Idle;
        self.start();
    }

    fn stop(&mut self) {
        self.pending_start = None;
        self.timer.stop();
        if self.state == GeneratorState::Generating {
            info!("MTC generator stopped");
        }
        self.state = GeneratorState::Idle;
    }

    fn sync_period(&mut self) {
        self.timer
            .set_period(self.encoder.local_frame_rate().mtc_quarter_frame_duration());
    }

    fn publish(&self) {
        let timecode = self.encoder.timecode().ok();
        self.snapshot.update(|snapshot| {
            snapshot.state = self.state;
            if let Some(timecode) = timecode {
                snapshot.timecode = timecode;
            }
            snapshot.local_frame_rate = self.encoder.local_frame_rate();
            snapshot.mtc_frame_rate = self.encoder.mtc_frame_rate();
            snapshot.full_frame_behavior = self.full_frame_behavior;
        });
    }
}
