// The scoring grid: a rendered score sampled at a fixed time step.
//
// Rows are voices, columns are grid steps of `resolution` quarter notes
// (0.25 = sixteenths). Each cell holds the sounding pitch (or rest), whether a
// note attacks at that step, and the index of the source note in its voice so
// that repairs found on the grid can be written back to the phrase.
//
// The grid is derived from the score, never the other way around. Scoring
// (scoring.rs) and the polish pass (optimize.rs) read it; nothing edits it.
//
// The step count comes from the longest voice. The renderer pads every voice
// to a common horizon before building a grid, so shorter voices are only
// truncated or rest-filled here when a caller skips that padding.

use crate::note::Note;

/// Step length used when a caller passes an unusable resolution.
pub const DEFAULT_RESOLUTION: f64 = 0.25;

/// Finest step a grid will use (a 256th note).
pub const MIN_RESOLUTION: f64 = 1.0 / 64.0;

/// A single cell in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    /// Sounding pitch, or `None` during a rest.
    pub pitch: Option<i32>,
    /// True if a note (or rest) begins at this step.
    pub attack: bool,
    /// Index of the note in its voice's phrase covering this step.
    pub note_index: Option<usize>,
}

/// A quantized multi-voice score.
///
/// Indexed as `voices[voice_index][step]`.
#[derive(Debug, Clone)]
pub struct Grid {
    /// Step length in quarter notes.
    pub resolution: f64,
    pub num_steps: usize,
    pub voices: Vec<Vec<Cell>>,
}

impl Grid {
    /// Quantize `voices` onto steps of `resolution` quarter notes.
    ///
    /// A non-finite or non-positive resolution falls back to
    /// `DEFAULT_RESOLUTION`; anything finer than `MIN_RESOLUTION` is coarsened.
    pub fn from_voices<V: AsRef<[Note]>>(voices: &[V], resolution: f64) -> Self {
        let resolution = if resolution.is_finite() && resolution > 0.0 {
            resolution.max(MIN_RESOLUTION)
        } else {
            DEFAULT_RESOLUTION
        };
        let to_step = |t: f64| (t / resolution + 1e-6).round() as usize;

        let horizon = voices
            .iter()
            .map(|v| v.as_ref().iter().map(|n| n.duration).sum::<f64>())
            .fold(0.0, f64::max);
        let num_steps = to_step(horizon);

        let rows = voices
            .iter()
            .map(|voice| {
                let mut row = vec![Cell::default(); num_steps];
                let mut t = 0.0;
                for (idx, note) in voice.as_ref().iter().enumerate() {
                    let start = to_step(t);
                    let end = to_step(t + note.duration).min(num_steps);
                    for (s, cell) in row.iter_mut().enumerate().take(end).skip(start) {
                        *cell = Cell {
                            pitch: note.pitch,
                            attack: s == start,
                            note_index: Some(idx),
                        };
                    }
                    t += note.duration;
                }
                row
            })
            .collect();

        Grid {
            resolution,
            num_steps,
            voices: rows,
        }
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn cell(&self, voice: usize, step: usize) -> &Cell {
        &self.voices[voice][step]
    }

    /// Sounding pitch of a voice at a step, `None` if resting.
    pub fn sounding_pitch(&self, voice: usize, step: usize) -> Option<i32> {
        self.voices[voice][step].pitch
    }

    /// True when a sounding note begins at this step.
    pub fn is_onset(&self, voice: usize, step: usize) -> bool {
        let cell = &self.voices[voice][step];
        cell.attack && cell.pitch.is_some()
    }

    /// Grid steps per quarter note (4 at sixteenth resolution).
    pub fn steps_per_quarter(&self) -> usize {
        (1.0 / self.resolution).round() as usize
    }

    /// Strong beats fall on every quarter note.
    pub fn is_strong_step(&self, step: usize) -> bool {
        match self.steps_per_quarter() {
            0 => false,
            q => step % q == 0,
        }
    }

    /// Number of steps spanning `beats` quarter notes.
    pub fn steps_for_beats(&self, beats: f64) -> usize {
        if self.resolution > 0.0 {
            (beats / self.resolution).round() as usize
        } else {
            0
        }
    }

    /// Print a compact text rendering of the grid for debugging: one row per
    /// voice, note names at attacks, `-` for holds, `.` for rests, `|` every
    /// 4/4 bar.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let bar_steps = self.steps_per_quarter() * 4;

        for (v, row) in self.voices.iter().enumerate() {
            out.push_str(&format!("{:>4}: ", format!("V{v}")));
            for (step, cell) in row.iter().enumerate() {
                if bar_steps > 0 && step > 0 && step % bar_steps == 0 {
                    out.push('|');
                }
                match cell.pitch {
                    None => out.push('.'),
                    Some(p) if cell.attack => out.push_str(&pitch_name(p)),
                    Some(_) => out.push('-'),
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Convert a pitch to a compact note name (e.g., "C4", "F#3").
pub fn pitch_name(pitch: i32) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    let octave = pitch.div_euclid(12) - 1;
    format!("{}{}", NAMES[pitch.rem_euclid(12) as usize], octave)
}

/// Musical interval helpers.
///
/// Intervals between two voices are classified on the absolute distance, so
/// a fifth is a fifth whichever voice is on top.
pub mod interval {
    /// Interval in semitones. Positive means `pitch_b` is higher.
    pub fn semitones(pitch_a: i32, pitch_b: i32) -> i32 {
        pitch_b - pitch_a
    }

    /// Absolute distance reduced to one octave (0-11).
    pub fn interval_mod12(pitch_a: i32, pitch_b: i32) -> u8 {
        ((pitch_b - pitch_a).unsigned_abs() % 12) as u8
    }

    /// Unison, fifth, or octave.
    pub fn is_perfect(iv: u8) -> bool {
        matches!(iv % 12, 0 | 7)
    }

    /// Unison, thirds, fourth, fifth, sixths, octave.
    pub fn is_consonant(iv: u8) -> bool {
        matches!(iv % 12, 0 | 3 | 4 | 5 | 7 | 8 | 9)
    }

    /// Seconds, sevenths, tritone.
    pub fn is_dissonant(iv: u8) -> bool {
        !is_consonant(iv)
    }
}
