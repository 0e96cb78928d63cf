// Pure phrase transformations: transposition, inversion, retrograde,
// time scaling, and time slicing.
//
// All five are total and deterministic. Rests pass through with their
// duration and position intact (time scaling and slicing still resize them).
// The generators in subject.rs and episode.rs build all derived material
// from these, so the identities checked in the tests below are what keeps
// answers, sequences, and imitations consistent with the subject.

use crate::note::{Note, Phrase};

/// Shift every pitched note by `semitones`.
pub fn transpose(phrase: &[Note], semitones: i32) -> Phrase {
    phrase
        .iter()
        .map(|n| Note {
            pitch: n.pitch.map(|p| p + semitones),
            ..*n
        })
        .collect()
}

/// Mirror every pitch around `axis_pitch`: `p -> 2*axis - p`.
pub fn invert(phrase: &[Note], axis_pitch: i32) -> Phrase {
    phrase
        .iter()
        .map(|n| Note {
            pitch: n.pitch.map(|p| 2 * axis_pitch - p),
            ..*n
        })
        .collect()
}

/// Reverse note order. This reverses the rhythm as well as the contour.
pub fn retrograde(phrase: &[Note]) -> Phrase {
    phrase.iter().rev().copied().collect()
}

/// Multiply every duration (rests included) by `factor`, which must be > 0.
pub fn time_scale(phrase: &[Note], factor: f64) -> Phrase {
    debug_assert!(factor > 0.0, "time_scale factor must be positive");
    phrase
        .iter()
        .map(|n| Note {
            duration: n.duration * factor,
            ..*n
        })
        .collect()
}

/// The part of `phrase` overlapping `[t0, t1)`.
///
/// Notes crossing a boundary are cut to the overlapping portion; each fragment
/// keeps its pitch (or rest status) and velocity.
pub fn slice_by_time(phrase: &[Note], t0: f64, t1: f64) -> Phrase {
    let mut out = Vec::new();
    let mut t = 0.0;
    for note in phrase {
        let start = t;
        let end = t + note.duration;
        if start < t1 && end > t0 {
            let dur = end.min(t1) - start.max(t0);
            if dur > 0.0 {
                out.push(Note {
                    duration: dur,
                    ..*note
                });
            }
        }
        t = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{DURATION_EPSILON, phrase_duration};

    fn sample() -> Phrase {
        vec![
            Note::pitched(60, 0.5, 96),
            Note::rest(0.5),
            Note::pitched(67, 1.0, 96),
            Note::pitched(65, 0.25, 80),
            Note::pitched(64, 1.75, 80),
        ]
    }

    fn assert_close(a: &[Note], b: &[Note]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert_eq!(x.pitch, y.pitch);
            assert_eq!(x.velocity, y.velocity);
            assert!((x.duration - y.duration).abs() < DURATION_EPSILON);
        }
    }

    #[test]
    fn test_transpose_roundtrip() {
        let p = sample();
        for n in [-24, -7, -1, 0, 5, 12, 31] {
            assert_eq!(transpose(&transpose(&p, n), -n), p);
        }
    }

    #[test]
    fn test_retrograde_involution() {
        let p = sample();
        assert_eq!(retrograde(&retrograde(&p)), p);
        assert_eq!(retrograde(&p)[0].duration, 1.75);
    }

    #[test]
    fn test_invert_involution() {
        let p = sample();
        for axis in [0, 60, 67, 100] {
            assert_eq!(invert(&invert(&p, axis), axis), p);
        }
        assert_eq!(invert(&p, 62)[0].pitch, Some(64));
    }

    #[test]
    fn test_time_scale_roundtrip() {
        let p = sample();
        for f in [0.75, 1.25, 2.0, 0.3] {
            assert_close(&time_scale(&time_scale(&p, f), 1.0 / f), &p);
        }
    }

    #[test]
    fn test_rests_preserved_in_place() {
        let p = sample();
        for t in [transpose(&p, 5), invert(&p, 60), time_scale(&p, 2.0)] {
            assert_eq!(t.len(), p.len());
            for (a, b) in t.iter().zip(&p) {
                assert_eq!(a.is_rest(), b.is_rest());
            }
        }
        assert_eq!(time_scale(&p, 2.0)[1].duration, 1.0);
    }

    #[test]
    fn test_slice_splits_boundary_notes() {
        let p = sample();
        // [0.25, 1.5): tail of C, whole rest, first half of G
        let s = slice_by_time(&p, 0.25, 1.5);
        assert_eq!(s.len(), 3);
        assert_eq!(s[0].pitch, Some(60));
        assert!((s[0].duration - 0.25).abs() < DURATION_EPSILON);
        assert!(s[1].is_rest());
        assert_eq!(s[2].pitch, Some(67));
        assert!((s[2].duration - 0.5).abs() < DURATION_EPSILON);
        assert!((phrase_duration(&s) - 1.25).abs() < DURATION_EPSILON);
    }

    #[test]
    fn test_slice_outside_is_empty() {
        let p = sample();
        assert!(slice_by_time(&p, 10.0, 12.0).is_empty());
        assert!(slice_by_time(&[], 0.0, 2.0).is_empty());
        assert_eq!(slice_by_time(&p, 0.0, 100.0), p);
    }
}
