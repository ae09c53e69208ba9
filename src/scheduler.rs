use crossbeam::channel::{self, Receiver};
use std::io;
use std::thread;
use std::time::{Duration, Instant};

/// Ticks a timer may fall behind before it resynchronises to the current time.
const MAX_LAG_PERIODS: u32 = 4;

pub trait Scheduler {
    fn spawn<F>(&self, name: &str, f: F) -> io::Result<thread::JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static;
}

pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        ThreadScheduler
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn spawn<F>(&self, name: &str, f: F) -> io::Result<thread::JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new().name(name.to_string()).spawn(f)
    }
}

/// A cancellable periodic deadline for use inside `crossbeam::select!`.
///
/// Deadlines follow a fixed schedule (each one is the previous deadline plus
/// the period) so jitter in handling a tick does not accumulate as drift.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period: Duration,
    next: Option<Instant>,
}

impl PeriodicTimer {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// Starts the timer with its first deadline at `first`.
    pub fn start(&mut self, first: Instant) {
        self.next = Some(first);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Takes effect from the next scheduled deadline on.
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next
    }

    /// Channel that fires at the next deadline, or never when stopped.
    pub fn receiver(&self) -> Receiver<Instant> {
        match self.next {
            Some(deadline) => channel::at(deadline),
            None => channel::never(),
        }
    }

    /// Schedules the deadline after the one that just fired.
    pub fn advance(&mut self, now: Instant) {
        if let Some(previous) = self.next {
            let next = previous + self.period;
            self.next = if now > next + self.period * MAX_LAG_PERIODS {
                Some(now + self.period)
            } else {
                Some(next)
            };
        }
    }
}
