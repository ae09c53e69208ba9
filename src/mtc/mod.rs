//! MIDI Time Code
//!
//! This module provides MTC synchronization, including:
//! - The four MTC frame rate families and scaling to real-world rates
//! - Wire encoding and parsing of full-frame and quarter-frame messages
//! - A stateful encoder and decoder
//! - A threaded generator (transmitter) and receiver (lock/drop-out supervision)
//!
//! The main components are:
//! - [`MtcGenerator`] which drives an [`MtcEncoder`] from a fixed-rate timer
//! - [`MtcReceiver`] which feeds an [`MtcDecoder`] into a [`ReceiverCore`] state machine

mod decoder;
mod encoder;
mod frame_rate;
mod generator;
pub mod message;
pub mod receiver;

pub use decoder::{DecoderEvent, MtcDecoder, TimecodeChange};
pub use encoder::MtcEncoder;
pub use frame_rate::MtcFrameRate;
pub use generator::{GeneratorConfig, GeneratorState, MtcGenerator};
pub use receiver::{
    core::ReceiverCore, MtcReceiver, ReceiverConfig, ReceiverEvent, ReceiverInput, ReceiverState,
    SyncPolicy,
};

use crate::timecode::{FrameRate, TimecodeError};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Sink for outgoing MTC bytes. Called once per complete message.
pub type MidiOutHandler = Box<dyn FnMut(&[u8]) + Send>;

#[derive(Debug, Error)]
pub enum MtcError {
    #[error("frame rate {local} is not compatible with MTC frame rate {mtc}")]
    IncompatibleFrameRate { local: FrameRate, mtc: MtcFrameRate },
    #[error(transparent)]
    Timecode(#[from] TimecodeError),
    #[error("sync thread is no longer running")]
    Disconnected,
    #[error("failed to spawn sync thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Playback direction inferred from quarter-frame ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Which message type produced a timecode position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    FullFrame,
    QuarterFrame,
}

/// When a locate should transmit a full-frame message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FullFrameBehavior {
    Always,
    /// Only when the position differs from the last full-frame sent.
    #[default]
    IfDifferent,
    Never,
}

impl fmt::Display for FullFrameBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FullFrameBehavior::Always => "always",
            FullFrameBehavior::IfDifferent => "if-different",
            FullFrameBehavior::Never => "never",
        })
    }
}

impl FromStr for FullFrameBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(FullFrameBehavior::Always),
            "if-different" | "ifdifferent" => Ok(FullFrameBehavior::IfDifferent),
            "never" => Ok(FullFrameBehavior::Never),
            other => Err(format!("unknown full-frame behavior: {other}")),
        }
    }
}
