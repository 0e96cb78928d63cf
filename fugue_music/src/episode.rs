// Developmental material: episodes, stretto entries, and the cadence.
//
// Episodes are built from subject fragments sequenced through fixed key-shift
// progressions, with occasional diminution/augmentation and short rests or
// stepwise connecting notes between fragments. The complex episode writes
// three staggered parts (original, inverted, augmented) whose delayed starts
// produce canonic imitation without any explicit alignment logic. Stretto
// entries overlap the subject with itself; the cadence is a dominant-tonic
// close.
//
// Every stochastic choice draws from the caller's `FugueRng`.

use crate::config::FugueParams;
use crate::note::{Note, Phrase, distinct_pitch_count, first_pitch, phrase_duration};
use crate::plan::Entry;
use crate::scale::ScaleMapper;
use crate::subject::{DOMINANT, answer_for};
use crate::transform::{invert, slice_by_time, time_scale, transpose};
use fugue_prng::FugueRng;
use tracing::{debug, warn};

/// Key shifts (semitones) a simple episode sequences its fragment through.
const EPISODE_SEQUENCE: [i32; 7] = [0, -3, 2, 7, 0, -5, 2];

/// Key shifts for the first part of the complex episode; the inverted part
/// uses the same list from its second element.
const COMPLEX_SEQUENCE: [i32; 5] = [0, 7, 2, -5, 0];

/// Key shifts for the augmented part of the complex episode.
const AUGMENTED_SEQUENCE: [i32; 3] = [0, 7, -5];

const CONNECTING_VELOCITY: u8 = 70;

/// Upper bound on stretto entries.
const MAX_STRETTO_ENTRIES: usize = 4;

/// Build a single-line episode of roughly `length_beats` quarter notes.
pub fn generate_episode(subject: &[Note], length_beats: f64, rng: &mut FugueRng) -> Phrase {
    if subject.is_empty() {
        return Vec::new();
    }

    let total = phrase_duration(subject);
    let candidates = [
        slice_by_time(subject, 0.0, (total / 2.0).min(2.0)),
        slice_by_time(subject, total / 3.0, (total / 3.0 + 2.0).min(total)),
        slice_by_time(subject, (total - 2.0).max(0.0), total),
    ];
    let mut fragment = most_varied(&candidates).to_vec();
    if fragment.is_empty() {
        fragment = subject.iter().take(2).copied().collect();
    }

    let mut episode: Phrase = Vec::new();
    let mut t = 0.0;
    let last = EPISODE_SEQUENCE.len() - 1;
    for (i, &shift) in EPISODE_SEQUENCE.iter().enumerate() {
        if t >= length_beats {
            break;
        }

        let mut piece = transpose(&fragment, shift);
        if i % 3 == 1 {
            piece = time_scale(&piece, 0.75);
        } else if i % 4 == 3 {
            piece = time_scale(&piece, 1.25);
        }
        t += phrase_duration(&piece);
        episode.extend(piece);

        let room = i < last && t < length_beats - 0.5;
        if room && rng.random_bool(0.25) {
            episode.push(Note::rest(0.25));
            t += 0.25;
        } else if room {
            if let Some(p) = episode.iter().rev().find_map(|n| n.pitch) {
                let step = rng.pick(&[-2, -1, 1, 2]);
                episode.push(Note::pitched(p + step, 0.25, CONNECTING_VELOCITY));
                t += 0.25;
            }
        }
    }

    debug!(
        notes = episode.len(),
        rests = episode.iter().filter(|n| n.is_rest()).count(),
        "episode generated"
    );
    episode
}

/// The candidate with the most distinct pitches; the earliest wins ties.
fn most_varied(candidates: &[Phrase]) -> &[Note] {
    let mut best: &[Note] = &[];
    let mut best_variety = 0;
    for (i, c) in candidates.iter().enumerate() {
        let variety = distinct_pitch_count(c);
        if i == 0 || variety > best_variety {
            best = c;
            best_variety = variety;
        }
    }
    best
}

/// Build the three-part episode used late in the form.
///
/// Part 0 alternates the two subject halves through `COMPLEX_SEQUENCE`; part 1
/// enters a beat later with inverted halves; part 2 enters two beats later
/// with the opening fragment in doubled note values.
pub fn generate_complex_episode(
    subject: &[Note],
    length_beats: f64,
    rng: &mut FugueRng,
) -> Vec<Phrase> {
    if subject.is_empty() {
        return Vec::new();
    }

    let total = phrase_duration(subject);
    let head = slice_by_time(subject, 0.0, (total / 2.0).min(2.0));
    let tail = slice_by_time(subject, total / 2.0, total);

    let mut upper: Phrase = Vec::new();
    let mut t = 0.0;
    for (i, &shift) in COMPLEX_SEQUENCE.iter().enumerate() {
        if t >= length_beats {
            break;
        }
        if i > 0 && rng.random_bool(0.2) {
            upper.push(Note::rest(0.5));
            t += 0.5;
        }
        let fragment = if i % 2 == 0 { &head } else { &tail };
        let piece = transpose(fragment, shift);
        t += phrase_duration(&piece);
        upper.extend(piece);
    }

    let mut inverted: Phrase = Vec::new();
    if !head.is_empty() {
        inverted.push(Note::rest(1.0));
        if let Some(axis) = first_pitch(&head) {
            for (i, &shift) in COMPLEX_SEQUENCE[1..].iter().enumerate() {
                if phrase_duration(&inverted) >= length_beats {
                    break;
                }
                if i > 0 && rng.random_bool(0.15) {
                    inverted.push(Note::rest(0.25));
                }
                let fragment = if i % 2 == 0 { &tail } else { &head };
                inverted.extend(transpose(&invert(fragment, axis), shift));
            }
        }
    }

    let mut augmented: Phrase = Vec::new();
    if !head.is_empty() {
        augmented.push(Note::rest(2.0));
        let doubled = time_scale(&head, 2.0);
        for (i, &shift) in AUGMENTED_SEQUENCE.iter().enumerate() {
            if phrase_duration(&augmented) >= length_beats {
                break;
            }
            if i > 0 && rng.random_bool(0.3) {
                augmented.push(Note::rest(1.0));
            }
            augmented.extend(transpose(&doubled, shift));
        }
    }

    let parts = vec![upper, inverted, augmented];
    for (i, part) in parts.iter().enumerate() {
        debug!(
            part = i,
            notes = part.len(),
            rests = part.iter().filter(|n| n.is_rest()).count(),
            "complex episode part"
        );
    }
    parts
}

/// Overlapping entries for a stretto, times relative to the section start.
///
/// Entries alternate subject and answer. From the third entry on, an entry may
/// be inverted (when permitted) or shifted by an octave.
pub fn generate_stretto_section(
    subject: &[Note],
    params: &FugueParams,
    rng: &mut FugueRng,
) -> Vec<Entry> {
    if subject.is_empty() {
        return Vec::new();
    }

    let voices = params.voice_count();
    let total = phrase_duration(subject);
    let spacing = total - total * params.overlap();
    let answer = answer_for(subject, params);
    let axis = first_pitch(subject).unwrap_or(params.tonic);

    (0..MAX_STRETTO_ENTRIES.min(voices))
        .map(|i| {
            let is_subject = i % 2 == 0;
            let mut material = if is_subject {
                subject.to_vec()
            } else {
                answer.clone()
            };
            if i >= 2 {
                if params.allow_inversion && rng.random_bool(0.4) {
                    material = invert(&material, axis);
                } else if rng.random_bool(0.3) {
                    material = transpose(&material, rng.pick(&[-12, 12]));
                }
            }
            Entry {
                voice_index: i % voices,
                start_time: i as f64 * spacing,
                material,
                is_subject,
            }
        })
        .collect()
}

/// Dominant-to-tonic close, with an optional dramatic rest before it and an
/// optional breath before the resolution.
pub fn generate_cadence(mapper: &impl ScaleMapper, tonic: i32, rng: &mut FugueRng) -> Phrase {
    let mut cadence = Vec::with_capacity(4);
    if rng.random_bool(0.2) {
        debug!("dramatic rest before cadence");
        cadence.push(Note::rest(0.5));
    }

    let (dominant, home) = match (mapper.get_note(4, 0), mapper.get_note(0, 0)) {
        (Ok(d), Ok(t)) => (d as i32, t as i32),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "cadence degrees unmapped, using tonic arithmetic");
            (tonic + DOMINANT, tonic)
        }
    };

    cadence.push(Note::pitched(dominant, 1.0, 90));
    if rng.random_bool(0.3) {
        cadence.push(Note::rest(0.25));
    }
    cadence.push(Note::pitched(home, 2.0, 96));
    cadence
}
