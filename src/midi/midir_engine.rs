use crate::midi::{MidiEngine, MidiError, Result};
use crossbeam::channel::{self, Receiver};
use log::{debug, info};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "mtcsyncrs";

/// Real MIDI ports through `midir`.
///
/// Ports are matched by substring of their name. SysEx is not filtered, since
/// MTC full-frame messages travel as SysEx.
#[derive(Default)]
pub struct MidirEngine {
    // kept alive for the lifetime of the engine; dropping it closes the port
    _input: Option<MidiInputConnection<()>>,
    output: Option<MidiOutputConnection>,
    rx: Option<Receiver<Vec<u8>>>,
}

impl MidirEngine {
    /// Opens the named input and/or output port. Either may be `None`.
    pub fn new(input_device: Option<&str>, output_device: Option<&str>) -> Result<Self> {
        let (input, rx) = match input_device {
            Some(name) => {
                let (input, rx) = Self::open_input(name)?;
                (Some(input), Some(rx))
            }
            None => (None, None),
        };
        let output = output_device.map(Self::open_output).transpose()?;

        Ok(MidirEngine {
            _input: input,
            output,
            rx,
        })
    }

    fn open_input(name: &str) -> Result<(MidiInputConnection<()>, Receiver<Vec<u8>>)> {
        let mut midi_in = MidiInput::new(&format!("{CLIENT_NAME}-in"))
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
        midi_in.ignore(Ignore::None);

        let in_ports = midi_in.ports();
        let in_port = in_ports
            .iter()
            .find(|p| midi_in.port_name(p).unwrap_or_default().contains(name))
            .ok_or_else(|| MidiError::ConnectionError(format!("Input device not found: {name}")))?;
        let port_name = midi_in.port_name(in_port).unwrap_or_default();

        let (tx, rx) = channel::unbounded();
        let input = midi_in
            .connect(
                in_port,
                &format!("{CLIENT_NAME}-input"),
                move |_stamp, message, _| {
                    let _ = tx.send(message.to_vec());
                },
                (),
            )
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
        info!("Opened MIDI input '{}'", port_name);
        Ok((input, rx))
    }

    fn open_output(name: &str) -> Result<MidiOutputConnection> {
        let midi_out = MidiOutput::new(&format!("{CLIENT_NAME}-out"))
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        let out_ports = midi_out.ports();
        let out_port = out_ports
            .iter()
            .find(|p| midi_out.port_name(p).unwrap_or_default().contains(name))
            .ok_or_else(|| MidiError::ConnectionError(format!("Output device not found: {name}")))?;
        let port_name = midi_out.port_name(out_port).unwrap_or_default();

        let output = midi_out
            .connect(out_port, &format!("{CLIENT_NAME}-output"))
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
        info!("Opened MIDI output '{}'", port_name);
        Ok(output)
    }
}

impl MidiEngine for MidirEngine {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(output) = &mut self.output {
            output
                .send(bytes)
                .map_err(|e| MidiError::SendError(e.to_string()))?;
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        match &self.rx {
            Some(rx) => rx
                .recv()
                .map_err(|e| MidiError::RecvError(e.to_string())),
            None => Err(MidiError::RecvError("No input connection".to_string())),
        }
    }

    fn list_devices(&self) -> Vec<String> {
        let mut devices = Vec::new();

        if let Ok(midi_in) = MidiInput::new(&format!("{CLIENT_NAME}-list")) {
            for port in midi_in.ports() {
                if let Ok(name) = midi_in.port_name(&port) {
                    devices.push(name);
                }
            }
        }
        if let Ok(midi_out) = MidiOutput::new(&format!("{CLIENT_NAME}-list")) {
            for port in midi_out.ports() {
                if let Ok(name) = midi_out.port_name(&port) {
                    if !devices.contains(&name) {
                        devices.push(name);
                    }
                }
            }
        }

        debug!("Found {} MIDI devices", devices.len());
        devices
    }
}
