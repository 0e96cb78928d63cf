// Melodic material: subject, tonal/real answer, and countersubject.
//
// The subject is built from a hand-authored rhythm template, an optional rest
// mask, and a scale-degree contour walk (mostly steps, some leaps, never three
// leaps the same way). The answer is the subject at the dominant; the tonal
// variant narrows an opening tonic-dominant leap to a fourth. The
// countersubject moves against the subject's rhythm: long subject notes get
// busy counterpoint and vice versa.
//
// Pitches come from a `ScaleMapper`. A failed mapping is logged and replaced
// by an arithmetic fallback; generation never aborts. All randomness comes
// from the caller's `FugueRng`.

use crate::config::FugueParams;
use crate::note::{Note, Phrase, first_pitch, phrase_duration};
use crate::scale::ScaleMapper;
use crate::transform::transpose;
use fugue_prng::FugueRng;
use tracing::{debug, info, warn};

/// Rhythm templates for subjects, in quarter notes.
const SUBJECT_RHYTHMS: [&[f64]; 6] = [
    &[0.5, 0.5, 1.0, 2.0],
    &[1.0, 0.5, 0.5, 2.0],
    &[0.25, 0.25, 0.5, 1.0, 2.0],
    &[1.0, 1.0, 1.0, 1.0],
    &[0.5, 0.25, 0.25, 1.0, 2.0],
    &[1.0, 0.5, 0.5, 1.0, 1.0],
];

/// Rest masks (true = rest). Index 0 is the "no rests" mask.
const REST_MASKS: [&[bool]; 7] = [
    &[false, false, false, false],
    &[false, false, true, false],
    &[false, true, false, false],
    &[true, false, false, false],
    &[false, false, false, true],
    &[false, true, false, true],
    &[false, false, true, false, false],
];

/// Probability that a subject uses one of the rest masks at all.
const SUBJECT_REST_CHANCE: f64 = 0.3;

const SUBJECT_VELOCITY: u8 = 96;
const COUNTERSUBJECT_VELOCITY: u8 = 80;

/// Semitones from tonic to dominant.
pub const DOMINANT: i32 = 7;

/// Generate a subject of `bars` 4/4 bars.
pub fn generate_subject(
    mapper: &impl ScaleMapper,
    params: &FugueParams,
    bars: u32,
    rng: &mut FugueRng,
) -> Phrase {
    let budget = 4.0 * bars.max(1) as f64;

    let start_degree = rng.pick(&[0, 4]);
    let mut durations: Vec<f64> = rng.choose(&SUBJECT_RHYTHMS).to_vec();

    let rest_mask: Vec<bool> = if rng.random_bool(SUBJECT_REST_CHANCE) {
        let mask = rng.choose(&REST_MASKS[1..]);
        (0..durations.len())
            .map(|i| mask.get(i).copied().unwrap_or(false))
            .collect()
    } else {
        vec![false; durations.len()]
    };

    let total: f64 = durations.iter().sum();
    if total > budget {
        let factor = budget / total;
        for d in &mut durations {
            *d *= factor;
        }
    }

    let steps = contour_steps(durations.len().saturating_sub(1), rng);

    let mut notes = Vec::with_capacity(durations.len());
    let mut degree = start_degree;
    for (i, (&duration, &is_rest)) in durations.iter().zip(&rest_mask).enumerate() {
        if is_rest {
            debug!(duration, "subject rest");
            notes.push(Note::rest(duration));
            continue;
        }
        let pitch = match mapper.get_note(degree, 0) {
            Ok(p) => p as i32,
            Err(e) => {
                warn!(degree, error = %e, "subject degree unmapped, using whole-tone fallback");
                params.tonic + 2 * degree
            }
        };
        notes.push(Note::pitched(pitch, duration, SUBJECT_VELOCITY));
        if let Some(&step) = steps.get(i) {
            degree = (degree + step).clamp(-7, 14);
        }
    }

    let rests = notes.iter().filter(|n| n.is_rest()).count();
    info!(
        notes = notes.len(),
        duration = phrase_duration(&notes),
        rests,
        "subject generated"
    );
    notes
}

/// Scale-degree steps for a contour: 60% steps, 30% small leaps, 10% large
/// leaps. A third consecutive move in the same direction is reversed.
fn contour_steps(count: usize, rng: &mut FugueRng) -> Vec<i32> {
    let mut steps: Vec<i32> = Vec::with_capacity(count);
    for _ in 0..count {
        let roll = rng.next_f64();
        let mut step: i32 = if roll < 0.6 {
            rng.pick(&[-1, 1])
        } else if roll < 0.9 {
            rng.pick(&[-2, 2, -3, 3])
        } else {
            rng.pick(&[-4, 4, -5, 5])
        };
        if let [.., a, b] = steps.as_slice() {
            if a.signum() == step.signum() && b.signum() == step.signum() {
                step = -step;
            }
        }
        steps.push(step);
    }
    steps
}

/// Exact transposition to the dominant.
pub fn real_answer(subject: &[Note]) -> Phrase {
    transpose(subject, DOMINANT)
}

/// Transposition to the dominant, with an opening tonic-to-dominant leap
/// (+7 between the first two pitched notes) answered by a fourth (+5).
pub fn tonal_answer(subject: &[Note]) -> Phrase {
    let mut answer = transpose(subject, DOMINANT);

    let pitched: Vec<usize> = subject
        .iter()
        .enumerate()
        .filter(|(_, n)| !n.is_rest())
        .map(|(i, _)| i)
        .take(2)
        .collect();
    let &[first, second] = pitched.as_slice() else {
        return answer;
    };
    let (Some(a), Some(b)) = (subject[first].pitch, subject[second].pitch) else {
        return answer;
    };
    if b - a == DOMINANT {
        if let Some(answer_first) = answer[first].pitch {
            answer[second] = answer[second].with_pitch(answer_first + 5);
        }
    }
    answer
}

/// Tonal or real answer according to `params.use_tonal_answer`.
pub fn answer_for(subject: &[Note], params: &FugueParams) -> Phrase {
    if params.use_tonal_answer {
        tonal_answer(subject)
    } else {
        real_answer(subject)
    }
}

/// Generate a countersubject that complements the subject's rhythm.
pub fn generate_countersubject(
    subject: &[Note],
    mapper: &impl ScaleMapper,
    rng: &mut FugueRng,
) -> Phrase {
    if subject.is_empty() {
        return Vec::new();
    }

    let subject_duration = phrase_duration(subject);
    let pitched = subject.iter().filter(|n| !n.is_rest()).count();
    let rest_time: f64 = subject
        .iter()
        .filter(|n| n.is_rest())
        .map(|n| n.duration)
        .sum();
    let average = (subject_duration - rest_time) / pitched.max(1) as f64;

    let (rhythm, mask): (&[f64], &[bool]) = if average > 0.75 {
        (
            &[0.5, 0.5, 0.25, 0.25, 0.5, 1.0],
            &[false, true, false, false, false, true],
        )
    } else {
        (&[1.0, 1.0, 2.0], &[false, true, false])
    };

    let pattern_total: f64 = rhythm.iter().sum();
    let factor = if pattern_total > subject_duration {
        subject_duration / pattern_total
    } else {
        1.0
    };

    let anchor = first_pitch(subject).unwrap_or(60);
    let mut out = Vec::with_capacity(rhythm.len());
    let mut t = 0.0;
    let mut degree: i32 = 2;
    for (&d, &masked) in rhythm.iter().zip(mask) {
        if t >= subject_duration {
            break;
        }
        let duration = d * factor;
        if masked || rng.random_bool(0.15) {
            out.push(Note::rest(duration));
        } else {
            match mapper.get_note(degree, 0) {
                Ok(p) => {
                    out.push(Note::pitched(p as i32, duration, COUNTERSUBJECT_VELOCITY));
                    degree = (degree + rng.pick(&[-2, -1, 1, 2])).clamp(-5, 10);
                }
                Err(e) => {
                    warn!(degree, error = %e, "countersubject degree unmapped, using harmonic fallback");
                    let pitch = anchor + rng.pick(&[3, 4, 7, 10]);
                    out.push(Note::pitched(pitch, duration, COUNTERSUBJECT_VELOCITY));
                }
            }
        }
        t += duration;
    }

    debug!(
        notes = out.len(),
        rests = out.iter().filter(|n| n.is_rest()).count(),
        "countersubject generated"
    );
    out
}
