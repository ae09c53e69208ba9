use crate::midi::MidiEngine;
use crate::mtc::MidiOutHandler;
use log::error;

/// Wraps `engine` as the byte sink of a generator.
///
/// Send failures are logged; the generator keeps running.
pub fn output_handler<T>(mut engine: T) -> MidiOutHandler
where
    T: MidiEngine + 'static,
{
    Box::new(move |bytes| {
        if let Err(e) = engine.send(bytes) {
            error!("Error sending MIDI message: {}", e);
        }
    })
}
