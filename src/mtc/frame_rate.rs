//! MTC base frame rate families and scaling to and from real-world rates
//!
//! The MTC hour byte carries a 2-bit rate field (`0rrhhhhh`):
//!
//! | bits | family |
//! |------|--------|
//! | 00   | 24     |
//! | 01   | 25     |
//! | 10   | 29.97 drop |
//! | 11   | 30     |
//!
//! Every other real rate is transmitted as one of these with its frame
//! number scaled down, e.g. `01:00:00:30 @ 60` goes out as `01:00:00:15 @ 30`.
//! The actual rate therefore cannot be inferred from the stream; the
//! receiving side scales back up to its own local rate.

use super::MtcError;
use crate::timecode::{Components, FrameRate, Timecode};
use std::fmt;
use std::time::Duration;

/// One of the four frame rate families expressible in MTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MtcFrameRate {
    Mtc24,
    Mtc25,
    Mtc2997Drop,
    Mtc30,
}

impl MtcFrameRate {
    pub const ALL: [MtcFrameRate; 4] = [
        MtcFrameRate::Mtc24,
        MtcFrameRate::Mtc25,
        MtcFrameRate::Mtc2997Drop,
        MtcFrameRate::Mtc30,
    ];

    /// Decodes the 2-bit rate field.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b00 => Some(MtcFrameRate::Mtc24),
            0b01 => Some(MtcFrameRate::Mtc25),
            0b10 => Some(MtcFrameRate::Mtc2997Drop),
            0b11 => Some(MtcFrameRate::Mtc30),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            MtcFrameRate::Mtc24 => 0b00,
            MtcFrameRate::Mtc25 => 0b01,
            MtcFrameRate::Mtc2997Drop => 0b10,
            MtcFrameRate::Mtc30 => 0b11,
        }
    }

    pub fn is_drop(&self) -> bool {
        *self == MtcFrameRate::Mtc2997Drop
    }

    /// The real-world rate whose frame numbers match this family one to one.
    pub fn direct_equivalent(&self) -> FrameRate {
        match self {
            MtcFrameRate::Mtc24 => FrameRate::Fps24,
            MtcFrameRate::Mtc25 => FrameRate::Fps25,
            MtcFrameRate::Mtc2997Drop => FrameRate::Fps29_97Drop,
            MtcFrameRate::Mtc30 => FrameRate::Fps30,
        }
    }

    /// Number of frame numbers per second in this family.
    pub fn frame_count(&self) -> u32 {
        self.direct_equivalent().frame_count()
    }

    /// All real-world rates that transmit as this family.
    pub fn derived_frame_rates(&self) -> Vec<FrameRate> {
        FrameRate::ALL
            .iter()
            .copied()
            .filter(|rate| rate.transmits_mtc(*self))
            .collect()
    }

    /// Scales raw MTC frames (plus elapsed quarter-frames, 0–7) to frames at `to`.
    ///
    /// The integer part of the result is the frame number, the fractional part is
    /// the position within that frame. Fails when `to` is not derived from this family.
    pub fn scaled_frames(
        &self,
        raw_frames: u32,
        quarter_frames: u8,
        to: FrameRate,
    ) -> Result<f64, MtcError> {
        if !to.transmits_mtc(*self) {
            return Err(MtcError::IncompatibleFrameRate {
                local: to,
                mtc: *self,
            });
        }

        let position = f64::from(raw_frames) + f64::from(quarter_frames.min(7)) * 0.25;
        if self.direct_equivalent() == to {
            return Ok(position);
        }

        let mut scaled = position * to.mtc_scale_factor();
        // 24.98 is carried as MTC-24 and always lands slightly under
        if to == FrameRate::Fps24_98 && scaled > 0.0 {
            scaled += 0.24;
        }
        Ok(scaled)
    }

    /// Converts a position in family units to a timecode at `to`.
    ///
    /// Whole frames implied by `quarter_frames` are carried at the family rate
    /// first, so a carry across a second boundary lands on the right second.
    /// The scaled frame number is clamped to the last frame of `to`.
    pub fn scaled_timecode(
        &self,
        components: Components,
        quarter_frames: u8,
        to: FrameRate,
    ) -> Result<Timecode, MtcError> {
        let base = Timecode::new(
            Components {
                subframes: 0,
                ..components
            },
            self.direct_equivalent(),
        )?
        .adding_frames(i64::from(quarter_frames / 4));

        let scaled = self.scaled_frames(u32::from(base.frames()), quarter_frames % 4, to)?;
        let frames = (scaled.floor() as u32).min(to.frame_count() - 1) as u8;
        Ok(Timecode::new(
            Components {
                frames,
                ..base.components()
            },
            to,
        )?)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MtcFrameRate::Mtc24 => "SMPTE-24",
            MtcFrameRate::Mtc25 => "SMPTE-25",
            MtcFrameRate::Mtc2997Drop => "SMPTE-29.97d",
            MtcFrameRate::Mtc30 => "SMPTE-30",
        }
    }
}

impl fmt::Display for MtcFrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FrameRate {
    /// The MTC family this rate is transmitted as.
    pub fn mtc_frame_rate(&self) -> MtcFrameRate {
        match self {
            FrameRate::Fps23_976
            | FrameRate::Fps24
            | FrameRate::Fps24_98
            | FrameRate::Fps47_952
            | FrameRate::Fps48
            | FrameRate::Fps95_904
            | FrameRate::Fps96 => MtcFrameRate::Mtc24,
            FrameRate::Fps25 | FrameRate::Fps50 | FrameRate::Fps100 => MtcFrameRate::Mtc25,
            FrameRate::Fps29_97Drop
            | FrameRate::Fps30Drop
            | FrameRate::Fps59_94Drop
            | FrameRate::Fps60Drop
            | FrameRate::Fps119_88Drop
            | FrameRate::Fps120Drop => MtcFrameRate::Mtc2997Drop,
            FrameRate::Fps29_97
            | FrameRate::Fps30
            | FrameRate::Fps59_94
            | FrameRate::Fps60
            | FrameRate::Fps90
            | FrameRate::Fps119_88
            | FrameRate::Fps120 => MtcFrameRate::Mtc30,
        }
    }

    pub fn transmits_mtc(&self, mtc_frame_rate: MtcFrameRate) -> bool {
        self.mtc_frame_rate() == mtc_frame_rate
    }

    /// Whether MTC positions can be exchanged between the two rates without
    /// breaking H:MM:SS. Symmetric.
    ///
    /// Rates are compatible only within one family, so 30 and 30d are not:
    /// 30d is carried by the 29.97 drop-frame code.
    pub fn is_compatible(&self, other: FrameRate) -> bool {
        self.mtc_frame_rate() == other.mtc_frame_rate()
    }

    /// Local frames per MTC family frame.
    pub fn mtc_scale_factor(&self) -> f64 {
        match self {
            FrameRate::Fps24_98 => 25.0 / 24.0,
            _ => f64::from(self.multiplier()),
        }
    }

    /// Scales a local frame number (fraction allowed) to raw MTC frames and a
    /// quarter-frame index.
    ///
    /// Raw frames are always even since one quarter-frame group spans two frames;
    /// the remainder becomes the quarter-frame index `0..=7`.
    pub fn mtc_scaled_frames(&self, frames: f64) -> (u32, u8) {
        let factor = match self {
            FrameRate::Fps24_98 => self.mtc_scale_factor() - 0.001,
            _ => self.mtc_scale_factor(),
        };
        let scaled = frames.max(0.0) / factor;
        let fraction = scaled % 2.0;
        let raw_frames = (scaled - fraction) as u32;
        let quarter_frame = ((fraction / 0.25) as u8).min(7);
        (raw_frames, quarter_frame)
    }

    /// Duration of one MTC quarter-frame when generating at this rate.
    ///
    /// Double and quadruple rates share the value of their 1x base.
    pub fn mtc_quarter_frame_duration(&self) -> Duration {
        self.frame_duration() * self.multiplier() / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_round_trip() {
        for family in MtcFrameRate::ALL {
            assert_eq!(MtcFrameRate::from_bits(family.bits()), Some(family));
        }
        assert_eq!(MtcFrameRate::from_bits(0b100), None);
    }

    #[test]
    fn test_family_mapping() {
        assert_eq!(FrameRate::Fps23_976.mtc_frame_rate(), MtcFrameRate::Mtc24);
        assert_eq!(FrameRate::Fps29_97.mtc_frame_rate(), MtcFrameRate::Mtc30);
        assert_eq!(FrameRate::Fps29_97Drop.mtc_frame_rate(), MtcFrameRate::Mtc2997Drop);
        assert_eq!(FrameRate::Fps30Drop.mtc_frame_rate(), MtcFrameRate::Mtc2997Drop);
        assert_eq!(FrameRate::Fps100.mtc_frame_rate(), MtcFrameRate::Mtc25);

        for family in MtcFrameRate::ALL {
            assert!(family.derived_frame_rates().contains(&family.direct_equivalent()));
        }
    }

    #[test]
    fn test_compatibility_is_symmetric() {
        for a in FrameRate::ALL {
            for b in FrameRate::ALL {
                assert_eq!(a.is_compatible(b), b.is_compatible(a));
            }
        }
        assert!(FrameRate::Fps29_97.is_compatible(FrameRate::Fps30));
        assert!(FrameRate::Fps60.is_compatible(FrameRate::Fps30));
        assert!(!FrameRate::Fps30.is_compatible(FrameRate::Fps29_97Drop));
        assert!(!FrameRate::Fps25.is_compatible(FrameRate::Fps30));
    }

    #[test]
    fn test_drop_and_non_drop_thirty_are_separate_families() {
        assert_eq!(FrameRate::Fps30Drop.mtc_frame_rate(), MtcFrameRate::Mtc2997Drop);
        assert!(!FrameRate::Fps30.is_compatible(FrameRate::Fps30Drop));
        assert!(!FrameRate::Fps30Drop.is_compatible(FrameRate::Fps30));
        assert!(FrameRate::Fps30Drop.is_compatible(FrameRate::Fps29_97Drop));
        assert!(!FrameRate::Fps30Drop.transmits_mtc(MtcFrameRate::Mtc30));
    }

    #[test]
    fn test_scaled_frames_to_local() {
        let scaled = MtcFrameRate::Mtc30.scaled_frames(10, 0, FrameRate::Fps30).unwrap();
        assert_eq!(scaled, 10.0);

        let scaled = MtcFrameRate::Mtc30.scaled_frames(10, 2, FrameRate::Fps60).unwrap();
        assert_eq!(scaled as u32, 21);

        let scaled = MtcFrameRate::Mtc24.scaled_frames(23, 0, FrameRate::Fps24_98).unwrap();
        assert_eq!(scaled as u32, 24);

        assert!(matches!(
            MtcFrameRate::Mtc30.scaled_frames(10, 0, FrameRate::Fps25),
            Err(MtcError::IncompatibleFrameRate { .. })
        ));
    }

    #[test]
    fn test_scaled_frames_to_mtc() {
        assert_eq!(FrameRate::Fps30.mtc_scaled_frames(15.0), (14, 4));
        assert_eq!(FrameRate::Fps30.mtc_scaled_frames(14.0), (14, 0));
        assert_eq!(FrameRate::Fps60.mtc_scaled_frames(31.0), (14, 6));
        assert_eq!(FrameRate::Fps120.mtc_scaled_frames(119.0), (28, 7));
    }

    #[test]
    fn test_scaling_round_trips_every_frame() {
        for rate in FrameRate::ALL {
            let family = rate.mtc_frame_rate();
            for frame in 0..rate.frame_count() {
                let (raw, qf) = rate.mtc_scaled_frames(f64::from(frame));
                let back = family.scaled_frames(raw, qf, rate).unwrap();
                if rate == FrameRate::Fps90 {
                    // quarter-frame resolution is 0.75 of a local frame
                    assert!(f64::from(frame) - back < 1.0, "{rate} frame {frame}");
                } else {
                    assert_eq!(back as u32, frame, "{rate} frame {frame}");
                }
            }
        }
    }

    #[test]
    fn test_scaled_timecode_carries_across_seconds() {
        let components = Components::new(0, 0, 0, 24);
        let timecode = MtcFrameRate::Mtc25
            .scaled_timecode(components, 4, FrameRate::Fps25)
            .unwrap();
        assert_eq!(timecode.components(), Components::new(0, 0, 1, 0));

        let timecode = MtcFrameRate::Mtc30
            .scaled_timecode(Components::new(1, 0, 0, 14), 6, FrameRate::Fps60)
            .unwrap();
        assert_eq!(timecode.components(), Components::new(1, 0, 0, 31));
    }

    #[test]
    fn test_quarter_frame_durations() {
        assert_eq!(
            FrameRate::Fps24.mtc_quarter_frame_duration().as_micros(),
            10_416
        );
        assert_eq!(
            FrameRate::Fps30.mtc_quarter_frame_duration().as_micros(),
            8_333
        );
        assert_eq!(
            FrameRate::Fps60.mtc_quarter_frame_duration(),
            FrameRate::Fps30.mtc_quarter_frame_duration()
        );
        assert_eq!(
            FrameRate::Fps25.mtc_quarter_frame_duration(),
            Duration::from_millis(10)
        );
    }
}
