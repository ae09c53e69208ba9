use crate::config::Overrides;
use crate::mtc::FullFrameBehavior;
use crate::timecode::FrameRate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "MIDI Time Code generator and receiver", long_about = None)]
pub struct Args {
    /// List available MIDI devices
    #[arg(long)]
    pub device_list: bool,

    /// Read settings from a TOML file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Transmit MTC to an output port
    Generate(GenerateArgs),
    /// Chase MTC arriving on an input port
    Receive(ReceiveArgs),
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Output device (substring match)
    #[arg(long)]
    pub output: Option<String>,

    /// Local frame rate, e.g. 25, 29.97d, 60
    #[arg(long)]
    pub rate: Option<FrameRate>,

    /// Start position, HH:MM:SS:FF
    #[arg(long)]
    pub start: Option<String>,

    /// When to send full-frame messages on locate: always, if-different, never
    #[arg(long = "full-frame")]
    pub full_frame: Option<FullFrameBehavior>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ReceiveArgs {
    /// Input device (substring match)
    #[arg(long)]
    pub input: Option<String>,

    /// Local frame rate to report positions in
    #[arg(long)]
    pub rate: Option<FrameRate>,

    /// Continuous frames required before lock
    #[arg(long)]
    pub lock_frames: Option<u32>,

    /// Frames of silence before dropping out
    #[arg(long)]
    pub drop_out_frames: Option<u32>,
}

impl Command {
    /// Flags that take precedence over file and environment settings.
    pub fn overrides(&self) -> Overrides {
        match self {
            Command::Generate(args) => Overrides {
                frame_rate: args.rate,
                full_frame_behavior: args.full_frame,
                output_device: args.output.clone(),
                start: args.start.clone(),
                ..Overrides::default()
            },
            Command::Receive(args) => Overrides {
                frame_rate: args.rate,
                lock_frames: args.lock_frames,
                drop_out_frames: args.drop_out_frames,
                input_device: args.input.clone(),
                ..Overrides::default()
            },
        }
    }
}

pub fn handle_device_list() -> Vec<String> {
    crate::midi::list_devices()
}

pub fn validate_device(device_name: &str, devices: &[String]) -> Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}
