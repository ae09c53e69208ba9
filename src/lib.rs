pub mod cli;
pub mod config;
pub mod logging;
pub mod midi;
pub mod mtc;
pub mod scheduler;
pub mod state;
pub mod timecode;
pub mod transport;
pub mod ui;

pub use cli::{handle_device_list, validate_device, Args};
pub use scheduler::{Scheduler, ThreadScheduler};
pub use state::Published;
