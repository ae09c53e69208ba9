use super::TimecodeError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Real-world timecode frame rates.
///
/// MTC itself can only describe four base rates (see [`crate::mtc::MtcFrameRate`]);
/// everything else is scaled down to one of those on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRate {
    Fps23_976,
    Fps24,
    Fps24_98,
    Fps25,
    Fps29_97,
    Fps29_97Drop,
    Fps30,
    Fps30Drop,
    Fps47_952,
    Fps48,
    Fps50,
    Fps59_94,
    Fps59_94Drop,
    Fps60,
    Fps60Drop,
    Fps90,
    Fps95_904,
    Fps96,
    Fps100,
    Fps119_88,
    Fps119_88Drop,
    Fps120,
    Fps120Drop,
}

impl FrameRate {
    pub const ALL: [FrameRate; 23] = [
        FrameRate::Fps23_976,
        FrameRate::Fps24,
        FrameRate::Fps24_98,
        FrameRate::Fps25,
        FrameRate::Fps29_97,
        FrameRate::Fps29_97Drop,
        FrameRate::Fps30,
        FrameRate::Fps30Drop,
        FrameRate::Fps47_952,
        FrameRate::Fps48,
        FrameRate::Fps50,
        FrameRate::Fps59_94,
        FrameRate::Fps59_94Drop,
        FrameRate::Fps60,
        FrameRate::Fps60Drop,
        FrameRate::Fps90,
        FrameRate::Fps95_904,
        FrameRate::Fps96,
        FrameRate::Fps100,
        FrameRate::Fps119_88,
        FrameRate::Fps119_88Drop,
        FrameRate::Fps120,
        FrameRate::Fps120Drop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameRate::Fps23_976 => "23.976",
            FrameRate::Fps24 => "24",
            FrameRate::Fps24_98 => "24.98",
            FrameRate::Fps25 => "25",
            FrameRate::Fps29_97 => "29.97",
            FrameRate::Fps29_97Drop => "29.97d",
            FrameRate::Fps30 => "30",
            FrameRate::Fps30Drop => "30d",
            FrameRate::Fps47_952 => "47.952",
            FrameRate::Fps48 => "48",
            FrameRate::Fps50 => "50",
            FrameRate::Fps59_94 => "59.94",
            FrameRate::Fps59_94Drop => "59.94d",
            FrameRate::Fps60 => "60",
            FrameRate::Fps60Drop => "60d",
            FrameRate::Fps90 => "90",
            FrameRate::Fps95_904 => "95.904",
            FrameRate::Fps96 => "96",
            FrameRate::Fps100 => "100",
            FrameRate::Fps119_88 => "119.88",
            FrameRate::Fps119_88Drop => "119.88d",
            FrameRate::Fps120 => "120",
            FrameRate::Fps120Drop => "120d",
        }
    }

    /// Number of frame numbers in one timecode second (max frame number + 1).
    pub fn frame_count(&self) -> u32 {
        match self {
            FrameRate::Fps23_976 | FrameRate::Fps24 => 24,
            FrameRate::Fps24_98 | FrameRate::Fps25 => 25,
            FrameRate::Fps29_97
            | FrameRate::Fps29_97Drop
            | FrameRate::Fps30
            | FrameRate::Fps30Drop => 30,
            FrameRate::Fps47_952 | FrameRate::Fps48 => 48,
            FrameRate::Fps50 => 50,
            FrameRate::Fps59_94
            | FrameRate::Fps59_94Drop
            | FrameRate::Fps60
            | FrameRate::Fps60Drop => 60,
            FrameRate::Fps90 => 90,
            FrameRate::Fps95_904 | FrameRate::Fps96 => 96,
            FrameRate::Fps100 => 100,
            FrameRate::Fps119_88
            | FrameRate::Fps119_88Drop
            | FrameRate::Fps120
            | FrameRate::Fps120Drop => 120,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(
            self,
            FrameRate::Fps29_97Drop
                | FrameRate::Fps30Drop
                | FrameRate::Fps59_94Drop
                | FrameRate::Fps60Drop
                | FrameRate::Fps119_88Drop
                | FrameRate::Fps120Drop
        )
    }

    /// Frame numbers skipped at the start of each minute not divisible by ten.
    pub fn dropped_frames_per_minute(&self) -> u32 {
        if self.is_drop() {
            2 * self.multiplier()
        } else {
            0
        }
    }

    /// Integer multiple of the rate's 1x base (e.g. 2 for 59.94, 4 for 120).
    pub fn multiplier(&self) -> u32 {
        match self {
            FrameRate::Fps47_952
            | FrameRate::Fps48
            | FrameRate::Fps50
            | FrameRate::Fps59_94
            | FrameRate::Fps59_94Drop
            | FrameRate::Fps60
            | FrameRate::Fps60Drop => 2,
            FrameRate::Fps90 => 3,
            FrameRate::Fps95_904
            | FrameRate::Fps96
            | FrameRate::Fps100
            | FrameRate::Fps119_88
            | FrameRate::Fps119_88Drop
            | FrameRate::Fps120
            | FrameRate::Fps120Drop => 4,
            _ => 1,
        }
    }

    /// Real frames per second as a `(numerator, denominator)` pair.
    pub fn fps_ratio(&self) -> (u64, u64) {
        let base = u64::from(self.multiplier());
        match self {
            FrameRate::Fps24_98 => (24_975, 1_000),
            FrameRate::Fps23_976 | FrameRate::Fps47_952 | FrameRate::Fps95_904 => {
                (24_000 * base, 1_001)
            }
            // 30d runs at the 29.97 wall-clock rate, only its numbering differs
            FrameRate::Fps29_97
            | FrameRate::Fps29_97Drop
            | FrameRate::Fps30Drop
            | FrameRate::Fps59_94
            | FrameRate::Fps59_94Drop
            | FrameRate::Fps60Drop
            | FrameRate::Fps119_88
            | FrameRate::Fps119_88Drop
            | FrameRate::Fps120Drop => (30_000 * base, 1_001),
            _ => (u64::from(self.frame_count()), 1),
        }
    }

    pub fn fps(&self) -> f64 {
        let (num, den) = self.fps_ratio();
        num as f64 / den as f64
    }

    /// Wall-clock duration of a single frame.
    pub fn frame_duration(&self) -> Duration {
        let (num, den) = self.fps_ratio();
        Duration::from_nanos(den * 1_000_000_000 / num)
    }

    /// Wall-clock duration of `frames` frames.
    pub fn frames_duration(&self, frames: u32) -> Duration {
        let (num, den) = self.fps_ratio();
        Duration::from_nanos(den * 1_000_000_000 * u64::from(frames) / num)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}fps", self.as_str())
    }
}

impl FromStr for FrameRate {
    type Err = TimecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches("fps").trim();
        let normalized = trimmed
            .strip_suffix("df")
            .or_else(|| trimmed.strip_suffix("drop"))
            .map(|base| format!("{}d", base.trim_end_matches(['-', '_', ' '])))
            .unwrap_or_else(|| trimmed.to_string());

        FrameRate::ALL
            .iter()
            .copied()
            .find(|rate| rate.as_str() == normalized)
            .ok_or_else(|| TimecodeError::UnknownFrameRate(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rates() {
        assert_eq!("30".parse::<FrameRate>().unwrap(), FrameRate::Fps30);
        assert_eq!("29.97d".parse::<FrameRate>().unwrap(), FrameRate::Fps29_97Drop);
        assert_eq!("29.97df".parse::<FrameRate>().unwrap(), FrameRate::Fps29_97Drop);
        assert_eq!("59.94-drop".parse::<FrameRate>().unwrap(), FrameRate::Fps59_94Drop);
        assert_eq!("25fps".parse::<FrameRate>().unwrap(), FrameRate::Fps25);
        assert!("31".parse::<FrameRate>().is_err());
    }

    #[test]
    fn test_round_trip_names() {
        for rate in FrameRate::ALL {
            assert_eq!(rate.as_str().parse::<FrameRate>().unwrap(), rate);
        }
    }

    #[test]
    fn test_frame_durations() {
        assert_eq!(FrameRate::Fps25.frame_duration(), Duration::from_millis(40));
        assert_eq!(FrameRate::Fps30.frames_duration(3), Duration::from_millis(100));

        // 1001/30000 s
        let ntsc = FrameRate::Fps29_97.frame_duration().as_nanos();
        assert_eq!(ntsc, 33_366_666);
        assert_eq!(FrameRate::Fps30Drop.frame_duration().as_nanos(), ntsc);
    }

    #[test]
    fn test_drop_frame_properties() {
        assert_eq!(FrameRate::Fps29_97Drop.dropped_frames_per_minute(), 2);
        assert_eq!(FrameRate::Fps59_94Drop.dropped_frames_per_minute(), 4);
        assert_eq!(FrameRate::Fps120Drop.dropped_frames_per_minute(), 8);
        assert_eq!(FrameRate::Fps29_97.dropped_frames_per_minute(), 0);
    }
}
