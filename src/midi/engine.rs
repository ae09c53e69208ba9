use thiserror::Error;

/// Error type for MIDI port operations
#[derive(Debug, Error)]
pub enum MidiError {
    /// Error when sending a MIDI message
    #[error("MIDI send error: {0}")]
    SendError(String),
    /// Error when receiving a MIDI message
    #[error("MIDI receive error: {0}")]
    RecvError(String),
    /// Error when connecting to a MIDI device
    #[error("MIDI connection error: {0}")]
    ConnectionError(String),
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, MidiError>;

/// Byte-level access to a MIDI port.
///
/// Implementations deal in complete messages: one `send` call writes one
/// message, one `recv` call returns one message.
pub trait MidiEngine: Send {
    /// Sends a complete MIDI message to the device
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Blocks until the next complete message arrives from the device
    fn recv(&mut self) -> Result<Vec<u8>>;

    /// Names of the ports visible to this engine
    fn list_devices(&self) -> Vec<String>;
}
