//! Timecode values
//!
//! A [`Timecode`] is an `HH:MM:SS:FF` position tagged with the real-world
//! [`FrameRate`] it is counted in. Frame arithmetic is drop-frame aware and
//! wraps within 24 hours, which is what MTC itself does on the wire.

mod frame_rate;

pub use frame_rate::FrameRate;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Subframe resolution used throughout the crate.
pub const SUBFRAMES_PER_FRAME: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimecodeError {
    #[error("{field} value {value} is out of range (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
    #[error("frame {frames} does not exist at minute {minutes} in drop-frame timecode")]
    DroppedFrame { minutes: u8, frames: u8 },
    #[error("invalid timecode string: {0:?}")]
    Parse(String),
    #[error("unknown frame rate: {0:?}")]
    UnknownFrameRate(String),
}

/// Raw timecode fields, without any frame rate attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Components {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub subframes: u8,
}

impl Components {
    pub const fn new(hours: u8, minutes: u8, seconds: u8, frames: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
            frames,
            subframes: 0,
        }
    }
}

impl fmt::Display for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

impl FromStr for Components {
    type Err = TimecodeError;

    /// Accepts `HH:MM:SS:FF`, `HH:MM:SS;FF` and an optional `.sf` subframe suffix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || TimecodeError::Parse(s.to_string());
        let (main, subframes) = match s.trim().split_once('.') {
            Some((main, sub)) => (main, sub.parse::<u8>().map_err(|_| parse_err())?),
            None => (s.trim(), 0),
        };

        let parts: Vec<&str> = main.split([':', ';']).collect();
        if parts.len() != 4 {
            return Err(parse_err());
        }
        let mut fields = [0u8; 4];
        for (field, part) in fields.iter_mut().zip(&parts) {
            *field = part.parse().map_err(|_| parse_err())?;
        }

        Ok(Components {
            hours: fields[0],
            minutes: fields[1],
            seconds: fields[2],
            frames: fields[3],
            subframes,
        })
    }
}

/// A validated timecode position at a specific frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timecode {
    components: Components,
    frame_rate: FrameRate,
}

impl Timecode {
    pub fn new(components: Components, frame_rate: FrameRate) -> Result<Self, TimecodeError> {
        validate(&components, frame_rate)?;
        Ok(Self {
            components,
            frame_rate,
        })
    }

    pub fn zero(frame_rate: FrameRate) -> Self {
        Self {
            components: Components::default(),
            frame_rate,
        }
    }

    pub fn parse(s: &str, frame_rate: FrameRate) -> Result<Self, TimecodeError> {
        Self::new(s.parse()?, frame_rate)
    }

    /// Builds a timecode from a frame count since midnight, wrapping within 24 hours.
    pub fn from_total_frames(total: i64, frame_rate: FrameRate) -> Self {
        let day = frames_per_day(frame_rate);
        let mut frame_number = total.rem_euclid(day);

        let fps = i64::from(frame_rate.frame_count());
        let drop = i64::from(frame_rate.dropped_frames_per_minute());
        if drop > 0 {
            let per_minute = fps * 60 - drop;
            let per_ten_minutes = fps * 600 - drop * 9;
            let tens = frame_number / per_ten_minutes;
            let remainder = frame_number % per_ten_minutes;
            frame_number += drop * 9 * tens;
            if remainder >= drop {
                frame_number += drop * ((remainder - drop) / per_minute);
            }
        }

        let frames = frame_number % fps;
        let total_seconds = frame_number / fps;
        Self {
            components: Components {
                hours: (total_seconds / 3600 % 24) as u8,
                minutes: (total_seconds / 60 % 60) as u8,
                seconds: (total_seconds % 60) as u8,
                frames: frames as u8,
                subframes: 0,
            },
            frame_rate,
        }
    }

    pub fn components(&self) -> Components {
        self.components
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn hours(&self) -> u8 {
        self.components.hours
    }

    pub fn minutes(&self) -> u8 {
        self.components.minutes
    }

    pub fn seconds(&self) -> u8 {
        self.components.seconds
    }

    pub fn frames(&self) -> u8 {
        self.components.frames
    }

    pub fn subframes(&self) -> u8 {
        self.components.subframes
    }

    /// Frames elapsed since midnight (subframes excluded).
    pub fn total_frames(&self) -> i64 {
        let c = &self.components;
        let fps = i64::from(self.frame_rate.frame_count());
        let total_minutes = i64::from(c.hours) * 60 + i64::from(c.minutes);
        let nominal = (total_minutes * 60 + i64::from(c.seconds)) * fps + i64::from(c.frames);
        let drop = i64::from(self.frame_rate.dropped_frames_per_minute());
        nominal - drop * (total_minutes - total_minutes / 10)
    }

    /// Returns this timecode moved by `frames` (negative moves backwards), wrapping at 24 hours.
    /// Subframes are carried over unchanged.
    pub fn adding_frames(&self, frames: i64) -> Self {
        let mut moved = Self::from_total_frames(self.total_frames() + frames, self.frame_rate);
        moved.components.subframes = self.components.subframes;
        moved
    }

    pub fn without_subframes(&self) -> Self {
        let mut truncated = *self;
        truncated.components.subframes = 0;
        truncated
    }

    /// Position on the wall clock since midnight.
    pub fn real_time(&self) -> Duration {
        let (num, den) = self.frame_rate.fps_ratio();
        let frames = self.total_frames() as u64;
        let whole = Duration::from_nanos(frames * den * 1_000_000_000 / num);
        whole + self.subframe_offset()
    }

    /// Wall-clock time represented by the subframe field alone.
    pub fn subframe_offset(&self) -> Duration {
        self.frame_rate.frame_duration() * u32::from(self.components.subframes)
            / u32::from(SUBFRAMES_PER_FRAME)
    }
}

impl PartialOrd for Timecode {
    /// Timecodes are only ordered against timecodes at the same frame rate.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.frame_rate != other.frame_rate {
            return None;
        }
        Some(
            self.total_frames()
                .cmp(&other.total_frames())
                .then(self.components.subframes.cmp(&other.components.subframes)),
        )
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.components;
        let separator = if self.frame_rate.is_drop() { ';' } else { ':' };
        let width = if self.frame_rate.frame_count() > 100 { 3 } else { 2 };
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:0width$}",
            c.hours,
            c.minutes,
            c.seconds,
            separator,
            c.frames,
            width = width
        )
    }
}

fn frames_per_day(frame_rate: FrameRate) -> i64 {
    let fps = i64::from(frame_rate.frame_count());
    let drop = i64::from(frame_rate.dropped_frames_per_minute());
    (fps * 600 - drop * 9) * 6 * 24
}

fn validate(c: &Components, frame_rate: FrameRate) -> Result<(), TimecodeError> {
    let check = |field: &'static str, value: u8, max: u32| {
        if u32::from(value) > max {
            Err(TimecodeError::OutOfRange {
                field,
                value: u32::from(value),
                max,
            })
        } else {
            Ok(())
        }
    };
    check("hours", c.hours, 23)?;
    check("minutes", c.minutes, 59)?;
    check("seconds", c.seconds, 59)?;
    check("frames", c.frames, frame_rate.frame_count() - 1)?;
    check("subframes", c.subframes, u32::from(SUBFRAMES_PER_FRAME) - 1)?;

    let drop = frame_rate.dropped_frames_per_minute();
    if drop > 0 && c.seconds == 0 && c.minutes % 10 != 0 && u32::from(c.frames) < drop {
        return Err(TimecodeError::DroppedFrame {
            minutes: c.minutes,
            frames: c.frames,
        });
    }
    Ok(())
}
