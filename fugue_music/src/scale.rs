// Scale-degree to pitch mapping.
//
// The generators think in scale degrees (tonic = 0, dominant = 4 in a
// heptatonic scale) and ask a `ScaleMapper` for concrete pitches. Degrees may
// be negative or exceed the scale length; they wrap through the scale with an
// octave carry, so degree 7 of a major scale is the tonic an octave up and
// degree -1 is the leading tone below.
//
// `ScaleMapper` is the seam to the host application's key/scale state.
// `ScaleTable` is the stock implementation used by the CLI, the sequencer,
// and the tests. Mapping can fail (the result leaves the MIDI range); callers
// in subject.rs and episode.rs catch that and fall back to arithmetic pitches.

use crate::error::{ConfigError, MappingError};
use serde::{Deserialize, Serialize};

/// Maps (scale degree, octave offset) to a MIDI pitch.
pub trait ScaleMapper {
    fn get_note(&self, degree: i32, octave: i32) -> Result<u8, MappingError>;
}

/// Named scales, each defined by its semitone offsets from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Major,
    Minor,
    HarmonicMinor,
    MelodicMinor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    Chromatic,
}

impl Scale {
    pub const ALL: [Scale; 13] = [
        Scale::Major,
        Scale::Minor,
        Scale::HarmonicMinor,
        Scale::MelodicMinor,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Locrian,
        Scale::PentatonicMajor,
        Scale::PentatonicMinor,
        Scale::Blues,
        Scale::Chromatic,
    ];

    /// Semitone offsets from the root for each degree.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Scale::PentatonicMajor => &[0, 2, 4, 7, 9],
            Scale::PentatonicMinor => &[0, 3, 5, 7, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::HarmonicMinor => "harmonic_minor",
            Scale::MelodicMinor => "melodic_minor",
            Scale::Dorian => "dorian",
            Scale::Phrygian => "phrygian",
            Scale::Lydian => "lydian",
            Scale::Mixolydian => "mixolydian",
            Scale::Locrian => "locrian",
            Scale::PentatonicMajor => "pentatonic_major",
            Scale::PentatonicMinor => "pentatonic_minor",
            Scale::Blues => "blues",
            Scale::Chromatic => "chromatic",
        }
    }

    /// Parse a scale name. Case-insensitive; `-` and spaces count as `_`.
    /// "ionian" and "aeolian" are accepted as aliases.
    pub fn from_name(name: &str) -> Result<Scale, ConfigError> {
        let normalized: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "ionian" => return Ok(Scale::Major),
            "aeolian" | "natural_minor" => return Ok(Scale::Minor),
            "pentatonic" => return Ok(Scale::PentatonicMajor),
            _ => {}
        }
        Scale::ALL
            .into_iter()
            .find(|s| s.name() == normalized)
            .ok_or_else(|| ConfigError::UnknownScale(name.to_string()))
    }
}

/// A scale rooted on a concrete MIDI pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTable {
    pub scale: Scale,
    /// MIDI pitch of degree 0 in octave 0.
    pub root: u8,
}

impl ScaleTable {
    pub fn new(scale: Scale, root: u8) -> Self {
        ScaleTable {
            scale,
            root: root.min(127),
        }
    }

    /// Build from a scale name, as stored in `FugueParams::mode`.
    pub fn from_name(name: &str, root: u8) -> Result<Self, ConfigError> {
        Ok(ScaleTable::new(Scale::from_name(name)?, root))
    }

    pub fn c_major() -> Self {
        ScaleTable::new(Scale::Major, 60)
    }

    /// True if the pitch class belongs to this scale.
    pub fn contains(&self, pitch: i32) -> bool {
        let pc = (pitch - self.root as i32).rem_euclid(12) as u8;
        self.scale.intervals().contains(&pc)
    }
}

impl ScaleMapper for ScaleTable {
    fn get_note(&self, degree: i32, octave: i32) -> Result<u8, MappingError> {
        let intervals = self.scale.intervals();
        if intervals.is_empty() {
            return Err(MappingError::EmptyScale);
        }
        let len = intervals.len() as i32;
        let carry = degree.div_euclid(len);
        let step = degree.rem_euclid(len) as usize;
        let pitch = self.root as i32 + 12 * (octave + carry) + intervals[step] as i32;
        if (0..=127).contains(&pitch) {
            Ok(pitch as u8)
        } else {
            Err(MappingError::OutOfRange {
                degree,
                octave,
                pitch,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_major_degrees() {
        let table = ScaleTable::c_major();
        assert_eq!(table.get_note(0, 0), Ok(60));
        assert_eq!(table.get_note(1, 0), Ok(62));
        assert_eq!(table.get_note(4, 0), Ok(67));
        assert_eq!(table.get_note(7, 0), Ok(72));
        assert_eq!(table.get_note(-1, 0), Ok(59));
        assert_eq!(table.get_note(0, -1), Ok(48));
    }

    #[test]
    fn test_pentatonic_wraps_by_five() {
        let table = ScaleTable::new(Scale::PentatonicMinor, 57);
        assert_eq!(table.get_note(5, 0), Ok(69));
        assert_eq!(table.get_note(-5, 0), Ok(45));
        assert_eq!(table.get_note(2, 0), Ok(62));
    }

    #[test]
    fn test_out_of_range_is_error() {
        let table = ScaleTable::new(Scale::Major, 120);
        assert!(matches!(
            table.get_note(7, 0),
            Err(MappingError::OutOfRange { pitch: 132, .. })
        ));
        let low = ScaleTable::new(Scale::Major, 2);
        assert!(low.get_note(-3, 0).is_err());
    }

    #[test]
    fn test_scale_names() {
        assert_eq!(Scale::from_name("Minor").unwrap(), Scale::Minor);
        assert_eq!(Scale::from_name("pentatonic-minor").unwrap(), Scale::PentatonicMinor);
        assert_eq!(Scale::from_name("harmonic minor").unwrap(), Scale::HarmonicMinor);
        assert_eq!(Scale::from_name("ionian").unwrap(), Scale::Major);
        assert!(matches!(
            Scale::from_name("klingon"),
            Err(ConfigError::UnknownScale(_))
        ));
        for scale in Scale::ALL {
            assert_eq!(Scale::from_name(scale.name()).unwrap(), scale);
        }
    }

    #[test]
    fn test_contains() {
        let d_dorian = ScaleTable::new(Scale::Dorian, 62);
        assert!(d_dorian.contains(62));
        assert!(d_dorian.contains(71)); // B natural
        assert!(!d_dorian.contains(63));
        assert!(!d_dorian.contains(66)); // F#
    }
}
