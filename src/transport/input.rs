use crate::midi::MidiEngine;
use crate::mtc::ReceiverInput;
use crate::scheduler::{Scheduler, ThreadScheduler};
use log::{debug, error, info};
use std::io;
use std::thread;

/// Pumps every message received by `engine` into `input` on a new thread.
///
/// The thread ends when the engine fails to receive or the receiver is gone.
pub fn run_midi_input<T>(mut engine: T, input: ReceiverInput) -> io::Result<thread::JoinHandle<()>>
where
    T: MidiEngine + 'static,
{
    ThreadScheduler::new().spawn("mtc-midi-input", move || {
        info!("MIDI input thread started");
        loop {
            match engine.recv() {
                Ok(bytes) => {
                    if input.midi_in(&bytes).is_err() {
                        debug!("Receiver gone, stopping MIDI input");
                        break;
                    }
                }
                Err(e) => {
                    error!("Error receiving MIDI message: {}", e);
                    break;
                }
            }
        }
        info!("MIDI input thread stopped");
    })
}
