use crate::midi::{MidiEngine, MidiError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory engine for tests.
///
/// Records everything sent and replays queued inbound messages. Once the
/// queue is empty `recv` fails, which ends any input pump reading from it.
/// Clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct MockMidiEngine {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    inbound: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl MockMidiEngine {
    pub fn new(_device_name: Option<String>) -> Result<Self> {
        Ok(MockMidiEngine::default())
    }

    pub fn queue_inbound(&self, bytes: &[u8]) {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(bytes.to_vec());
    }

    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MidiEngine for MockMidiEngine {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bytes.to_vec());
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| MidiError::RecvError("No more queued input".to_string()))
    }

    fn list_devices(&self) -> Vec<String> {
        vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()]
    }
}
