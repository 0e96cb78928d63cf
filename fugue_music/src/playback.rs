// Step-wise playback of a rendered score.
//
// A `PlaybackCursor` walks a `Score` one sixteenth note at a time. It keeps one
// "next note time" and one "next note index" per voice. Each tick covers the
// window [t, t + 0.25) of musical time and returns every note that starts
// inside it, converted to seconds at the given tempo. Rests advance their
// voice silently.
//
// The cursor never touches the score; it only reads it. It is not shared
// between threads.

use crate::note::{DURATION_EPSILON, Score, midi_pitch};
use serde::Serialize;
use tracing::debug;

/// Musical time covered by one tick (a sixteenth note).
pub const TICK_BEATS: f64 = 0.25;

/// A note due for playback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduledNote {
    pub voice: usize,
    pub pitch: u8,
    pub velocity: u8,
    pub duration_secs: f64,
}

/// Per-voice playback position over an owned score.
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    score: Score,
    musical_time: f64,
    next_times: Vec<f64>,
    positions: Vec<usize>,
}

impl PlaybackCursor {
    pub fn new(score: Score) -> Self {
        let voices = score.voice_count();
        PlaybackCursor {
            score,
            musical_time: 0.0,
            next_times: vec![0.0; voices],
            positions: vec![0; voices],
        }
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    /// Musical time already played, in quarter notes.
    pub fn musical_time(&self) -> f64 {
        self.musical_time
    }

    /// True once every voice has consumed all its notes.
    pub fn is_exhausted(&self) -> bool {
        self.score
            .voices()
            .iter()
            .zip(&self.positions)
            .all(|(voice, &pos)| pos >= voice.len())
    }

    /// Advance by one sixteenth and return the notes starting in that window.
    pub fn tick(&mut self, bpm: f64) -> Vec<ScheduledNote> {
        let seconds_per_beat = 60.0 / bpm;
        let window_end = self.musical_time + TICK_BEATS;
        let mut due = Vec::new();

        for (voice, phrase) in self.score.voices().iter().enumerate() {
            while let Some(note) = phrase.get(self.positions[voice]) {
                if self.next_times[voice] >= window_end - DURATION_EPSILON {
                    break;
                }
                self.next_times[voice] += note.duration;
                self.positions[voice] += 1;
                match note.pitch {
                    Some(p) => due.push(ScheduledNote {
                        voice,
                        pitch: midi_pitch(p),
                        velocity: note.velocity,
                        duration_secs: note.duration * seconds_per_beat,
                    }),
                    None => debug!(voice, time = self.musical_time, "rest"),
                }
            }
        }

        self.musical_time = window_end;
        due
    }
}
