//! User interface components
//!
//! This module provides the terminal display for mtcsyncrs, including:
//! - A live timecode spinner for the generator and the receiver
//! - Timestamped receiver state lines
//!
//! The UI is built using the indicatif library for progress bars and spinners.

mod progress;

pub use progress::create_timecode_spinner;

use crate::mtc::{GeneratorState, MtcGenerator, MtcReceiver, ReceiverEvent, ReceiverState};
use crossbeam::channel::{self, select};
use std::time::{Duration, Instant};

/// Redraw interval for the live display.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(40);

pub fn describe_state(state: &ReceiverState) -> String {
    match state {
        ReceiverState::Idle => "idle".to_string(),
        ReceiverState::PreSync {
            predicted_lock_time,
            lock_timecode,
        } => format!(
            "pre-sync (lock at {} in {} ms)",
            lock_timecode,
            predicted_lock_time
                .saturating_duration_since(Instant::now())
                .as_millis()
        ),
        ReceiverState::Sync => "sync".to_string(),
        ReceiverState::Freewheeling => "freewheeling".to_string(),
        ReceiverState::IncompatibleFrameRate => "incompatible frame rate".to_string(),
    }
}

/// Prefixes `line` with the local wall-clock time.
pub fn timestamped(line: &str) -> String {
    format!("[{}] {}", chrono::Local::now().format("%H:%M:%S%.3f"), line)
}

/// Shows the generator position until the process exits.
pub fn run_generator_display(generator: &MtcGenerator) {
    let pb = create_timecode_spinner("MTC out");
    let ticker = channel::tick(REFRESH_INTERVAL);
    loop {
        let status = match generator.state() {
            GeneratorState::Generating => "running",
            GeneratorState::Idle => "stopped",
        };
        pb.set_message(format!(
            "{} @ {} ({}) {}",
            generator.timecode(),
            generator.local_frame_rate(),
            generator.mtc_frame_rate(),
            status
        ));
        if ticker.recv().is_err() {
            break;
        }
    }
}

/// Shows the received position and logs state changes until the receiver stops.
pub fn run_receiver_display(receiver: &MtcReceiver) {
    let pb = create_timecode_spinner("MTC in");
    let events = receiver.events();
    let ticker = channel::tick(REFRESH_INTERVAL);
    loop {
        select! {
            recv(events) -> event => match event {
                Ok(ReceiverEvent::StateChanged(state)) => {
                    pb.println(timestamped(&describe_state(&state)));
                }
                Ok(ReceiverEvent::TimecodeChanged(_)) => {}
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                let position = receiver
                    .timecode()
                    .map(|tc| tc.to_string())
                    .unwrap_or_else(|| "--:--:--:--".to_string());
                pb.set_message(format!(
                    "{} ({}, {:?}) {}",
                    position,
                    receiver.mtc_frame_rate(),
                    receiver.direction(),
                    describe_state(&receiver.state())
                ));
            }
        }
    }
    pb.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_state() {
        assert_eq!(describe_state(&ReceiverState::Sync), "sync");
        assert_eq!(
            describe_state(&ReceiverState::IncompatibleFrameRate),
            "incompatible frame rate"
        );
    }

    #[test]
    fn test_timestamped_prefix() {
        let line = timestamped("sync");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] sync"));
    }
}
