// MIDI output from rendered scores.
//
// Converts a `Score` into a Standard MIDI File (SMF Format 1): a tempo track
// followed by one track per voice, each voice on its own channel. Note times
// come straight from the accumulated quarter-note durations; rests only
// advance time.
//
// Uses the `midly` crate for MIDI writing.

use crate::error::ExportError;
use crate::note::{Score, midi_pitch};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Church organ.
const PROGRAM: u8 = 19;

const VOICE_NAMES: [&str; 4] = ["Soprano", "Alto", "Tenor", "Bass"];

/// Convert a score to MIDI and write it to a file.
pub fn write_midi(score: &Score, bpm: f64, path: &Path) -> Result<(), ExportError> {
    let smf = score_to_smf(score, bpm);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

fn quarters_to_ticks(quarters: f64) -> u32 {
    (quarters * TICKS_PER_QUARTER as f64).round().max(0.0) as u32
}

fn event(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind,
    }
}

/// Convert a score to an in-memory SMF.
pub fn score_to_smf(score: &Score, bpm: f64) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo
    let tempo_micros = (60_000_000.0 / bpm.max(1.0)).round().min(16_777_215.0) as u32;
    smf.tracks.push(vec![
        event(0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_micros)))),
        event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
    ]);

    for (vi, voice) in score.voices().iter().enumerate() {
        let channel = u4::new((vi % 16) as u8);
        let mut track: Track<'static> = Vec::with_capacity(voice.len() * 2 + 3);

        let name = VOICE_NAMES.get(vi).copied().unwrap_or("Voice");
        track.push(event(0, TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes()))));
        track.push(event(
            0,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(PROGRAM),
                },
            },
        ));

        let mut time = 0.0;
        let mut last_event_tick = 0;
        for note in voice {
            let start = quarters_to_ticks(time);
            time += note.duration;
            let Some(pitch) = note.pitch else {
                continue;
            };
            let end = quarters_to_ticks(time);
            let key = u7::new(midi_pitch(pitch));

            track.push(event(
                start - last_event_tick,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key,
                        vel: u7::new(note.velocity.clamp(1, 127)),
                    },
                },
            ));
            track.push(event(
                end - start,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key,
                        vel: u7::new(0),
                    },
                },
            ));
            last_event_tick = end;
        }

        track.push(event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)));
        smf.tracks.push(track);
    }

    smf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;

    fn score() -> Score {
        Score::from_voices(vec![
            vec![Note::pitched(72, 1.0, 96), Note::pitched(74, 0.5, 96)],
            vec![Note::rest(0.5), Note::pitched(60, 1.0, 80)],
        ])
    }

    fn note_events(track: &Track) -> Vec<(u32, bool, u8)> {
        track
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, .. },
                    ..
                } => Some((e.delta.as_int(), true, key.as_int())),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, .. },
                    ..
                } => Some((e.delta.as_int(), false, key.as_int())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_score_to_smf_tracks() {
        let smf = score_to_smf(&score(), 120.0);
        // 1 tempo track + 2 voice tracks
        assert_eq!(smf.tracks.len(), 3);
        assert!(matches!(
            smf.tracks[0][0].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 500_000
        ));
    }

    #[test]
    fn test_note_timing() {
        let smf = score_to_smf(&score(), 120.0);
        assert_eq!(
            note_events(&smf.tracks[1]),
            vec![(0, true, 72), (480, false, 72), (0, true, 74), (240, false, 74)]
        );
        // Leading rest becomes delay before the first note.
        assert_eq!(note_events(&smf.tracks[2]), vec![(240, true, 60), (480, false, 60)]);
    }

    #[test]
    fn test_write_midi_roundtrip() {
        let path = std::env::temp_dir().join(format!("fugue_midi_test_{}.mid", std::process::id()));
        write_midi(&score(), 90.0, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let parsed = Smf::parse(&bytes).unwrap();
        assert_eq!(parsed.tracks.len(), 3);
        let _ = std::fs::remove_file(&path);
    }
}
