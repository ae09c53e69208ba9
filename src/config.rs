// config.rs

use crate::mtc::{FullFrameBehavior, SyncPolicy};
use crate::timecode::{FrameRate, Timecode, TimecodeError};
use config::{Config, ConfigError, Environment, File, FileFormat};
use log::debug;
use serde::{de, Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Prefix for environment overrides, e.g. `MTCSYNC_FRAME_RATE=25`.
pub const ENV_PREFIX: &str = "MTCSYNC";

pub const DEFAULT_LOCK_FRAMES: u32 = 16;
pub const DEFAULT_DROP_OUT_FRAMES: u32 = 10;

/// Resolved runtime settings.
///
/// Sources are layered lowest first: built-in defaults, the optional TOML
/// file, `MTCSYNC_*` environment variables, then command line flags.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Local frame rate. A receiver without one reports at the incoming rate.
    #[serde(default, deserialize_with = "parse_optional")]
    pub frame_rate: Option<FrameRate>,
    pub lock_frames: u32,
    pub drop_out_frames: u32,
    pub full_frame_behavior: FullFrameBehavior,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    /// Generator start position, `HH:MM:SS:FF`.
    pub start: Option<String>,
}

/// Values given on the command line. `None` leaves lower layers in effect.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub frame_rate: Option<FrameRate>,
    pub lock_frames: Option<u32>,
    pub drop_out_frames: Option<u32>,
    pub full_frame_behavior: Option<FullFrameBehavior>,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub start: Option<String>,
}

impl Settings {
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("lock_frames", i64::from(DEFAULT_LOCK_FRAMES))?
            .set_default("drop_out_frames", i64::from(DEFAULT_DROP_OUT_FRAMES))?
            .set_default(
                "full_frame_behavior",
                FullFrameBehavior::default().to_string(),
            )?;

        if let Some(path) = file {
            debug!("Reading settings from {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("frame_rate", overrides.frame_rate.map(|r| r.as_str()))?
            .set_override_option("lock_frames", overrides.lock_frames.map(i64::from))?
            .set_override_option(
                "drop_out_frames",
                overrides.drop_out_frames.map(i64::from),
            )?
            .set_override_option(
                "full_frame_behavior",
                overrides.full_frame_behavior.map(|b| b.to_string()),
            )?
            .set_override_option("input_device", overrides.input_device.clone())?
            .set_override_option("output_device", overrides.output_device.clone())?
            .set_override_option("start", overrides.start.clone())?
            .build()?
            .try_deserialize()?;

        debug!("Resolved settings: {:?}", settings);
        Ok(settings)
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy::new(self.lock_frames, self.drop_out_frames)
    }

    /// The generator start position at `frame_rate`, zero when unset.
    pub fn start_timecode(&self, frame_rate: FrameRate) -> Result<Timecode, TimecodeError> {
        match &self.start {
            Some(start) => Timecode::parse(start, frame_rate),
            None => Ok(Timecode::zero(frame_rate)),
        }
    }
}

fn parse_optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    Option::<String>::deserialize(deserializer)?
        .map(|value| value.parse().map_err(de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::load(None, &Overrides::default()).unwrap();
        assert_eq!(settings.frame_rate, None);
        assert_eq!(settings.lock_frames, DEFAULT_LOCK_FRAMES);
        assert_eq!(settings.full_frame_behavior, FullFrameBehavior::IfDifferent);
        assert_eq!(settings.sync_policy(), SyncPolicy::default());
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            frame_rate: Some(FrameRate::Fps29_97Drop),
            lock_frames: Some(4),
            full_frame_behavior: Some(FullFrameBehavior::Never),
            start: Some("01:00:00;02".to_string()),
            ..Overrides::default()
        };
        let settings = Settings::load(None, &overrides).unwrap();
        assert_eq!(settings.frame_rate, Some(FrameRate::Fps29_97Drop));
        assert_eq!(settings.lock_frames, 4);
        assert_eq!(settings.full_frame_behavior, FullFrameBehavior::Never);

        let start = settings.start_timecode(FrameRate::Fps29_97Drop).unwrap();
        assert_eq!(start.hours(), 1);
        assert_eq!(start.frames(), 2);
    }

    #[test]
    fn test_start_defaults_to_zero() {
        let settings = Settings::load(None, &Overrides::default()).unwrap();
        let start = settings.start_timecode(FrameRate::Fps25).unwrap();
        assert_eq!(start, Timecode::zero(FrameRate::Fps25));
    }
}
