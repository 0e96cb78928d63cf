// Music primitives: notes, phrases, and the rendered multi-voice score.
//
// A `Note` is either pitched or a rest (`pitch == None`). Durations are in
// quarter-note units and always positive. A `Phrase` is one voice's ordered
// timeline fragment; a `Score` is one phrase per voice, voice 0 being the
// highest by convention.
//
// Pitches are plain integers while material is being built so that
// transposition and inversion compose exactly (transposing up then down must
// give back the original phrase). The renderer folds every pitch into its
// voice range before a `Score` leaves the engine, and the outward surfaces
// (midi.rs, playback.rs) clamp to the MIDI range via `midi_pitch`.

use crate::error::ExportError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Durations closer than this are considered equal.
pub const DURATION_EPSILON: f64 = 1e-6;

/// A single note or rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI-style pitch number, or `None` for a rest.
    pub pitch: Option<i32>,
    /// Duration in quarter notes. Always > 0.
    pub duration: f64,
    /// Attack velocity (0-127). Rests carry 0.
    pub velocity: u8,
}

impl Note {
    pub fn pitched(pitch: i32, duration: f64, velocity: u8) -> Self {
        debug_assert!(duration > 0.0, "note duration must be positive");
        Note {
            pitch: Some(pitch),
            duration,
            velocity: velocity.min(127),
        }
    }

    pub fn rest(duration: f64) -> Self {
        debug_assert!(duration > 0.0, "rest duration must be positive");
        Note {
            pitch: None,
            duration,
            velocity: 0,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }

    /// Same rhythm and velocity, different pitch.
    pub fn with_pitch(&self, pitch: i32) -> Self {
        Note {
            pitch: Some(pitch),
            ..*self
        }
    }
}

/// One voice's timeline fragment.
pub type Phrase = Vec<Note>;

/// Total duration of a phrase in quarter notes.
pub fn phrase_duration(phrase: &[Note]) -> f64 {
    phrase.iter().map(|n| n.duration).sum()
}

/// Pitch of the first non-rest note, if any.
pub fn first_pitch(phrase: &[Note]) -> Option<i32> {
    phrase.iter().find_map(|n| n.pitch)
}

/// Number of distinct pitches in a phrase, rests excluded.
pub fn distinct_pitch_count(phrase: &[Note]) -> usize {
    let mut pitches: Vec<i32> = phrase.iter().filter_map(|n| n.pitch).collect();
    pitches.sort_unstable();
    pitches.dedup();
    pitches.len()
}

/// Clamp an engine pitch into the MIDI range.
pub fn midi_pitch(pitch: i32) -> u8 {
    pitch.clamp(0, 127) as u8
}

/// A rendered multi-voice piece.
///
/// Only the engine builds a `Score`; callers get read-only access. After
/// rendering every voice spans the same horizon (trailing rests included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    voices: Vec<Phrase>,
}

impl Score {
    pub(crate) fn from_voices(voices: Vec<Phrase>) -> Self {
        Score { voices }
    }

    pub fn voices(&self) -> &[Phrase] {
        &self.voices
    }

    pub fn voice(&self, index: usize) -> Option<&[Note]> {
        self.voices.get(index).map(Vec::as_slice)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Length of the longest voice in quarter notes.
    pub fn horizon(&self) -> f64 {
        self.voices
            .iter()
            .map(|v| phrase_duration(v))
            .fold(0.0, f64::max)
    }

    /// Total number of pitched notes across all voices.
    pub fn note_count(&self) -> usize {
        self.voices
            .iter()
            .map(|v| v.iter().filter(|n| !n.is_rest()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.iter().all(|v| v.is_empty())
    }

    /// Write the score as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
