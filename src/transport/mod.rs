//! Transport functionality
//!
//! This module connects the MTC engine to MIDI ports:
//! - inbound bytes are pumped from an engine into a receiver
//! - outbound bytes from a generator are written to an engine

mod input;
mod output;

pub use input::run_midi_input;
pub use output::output_handler;
