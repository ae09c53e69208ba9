//! MIDI port access for mtcsyncrs
//!
//! This module is the byte boundary between the MTC engine and real ports:
//! - [`MidiEngine`] trait for sending and receiving complete messages
//! - [`MidirEngine`] for real MIDI device communication
//! - [`MockMidiEngine`] for testing
//!
mod engine;
pub mod midir_engine;
pub mod mock_engine;

pub use engine::{MidiEngine, MidiError, Result};
pub use midir_engine::MidirEngine;
pub use mock_engine::MockMidiEngine;

/// Lists the MIDI ports available on this machine.
#[cfg(not(feature = "test-mock"))]
pub fn list_devices() -> Vec<String> {
    MidirEngine::default().list_devices()
}

/// Lists the mock ports.
#[cfg(feature = "test-mock")]
pub fn list_devices() -> Vec<String> {
    MockMidiEngine::default().list_devices()
}
