// Counterpoint refinement: greedy optimizer, unison polish, range folding.
//
// The optimizer walks every pitched note of every voice and tries four
// replacements (octave down/up, semitone down/up). Each candidate is scored
// against the whole score; the best one that lowers the cost by more than a
// small epsilon and stays inside the voice's range is committed before moving
// on. A pass with no improvement ends the run early.
//
// The polish pass looks only for the hard-unison case (two voices attacking
// the same pitch together) and moves one of the colliding notes by an octave.
// Range enforcement then folds every pitch into its voice's bounds.
//
// Anchors are `(voice, note_index)` pairs that the optimizer and the polish
// pass leave alone: the subject and answer statements of the exposition.
// Range enforcement ignores anchors.
//
// Depends on scoring.rs for evaluation and grid.rs for locating onsets.

use crate::config::FugueParams;
use crate::grid::Grid;
use crate::note::{Note, Phrase};
use crate::scoring::score_counterpoint;
use std::collections::HashSet;
use tracing::debug;

/// Candidate pitch offsets tried for each note, in order.
const PROPOSALS: [i32; 4] = [-12, 12, -1, 1];

/// A candidate must beat the current cost by more than this.
const IMPROVEMENT_EPSILON: f64 = 1e-6;

/// Statistics from an optimizer run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeStats {
    pub passes: usize,
    pub changes: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
}

fn range_for(ranges: &[(i32, i32)], voice: usize) -> (i32, i32) {
    ranges.get(voice).copied().unwrap_or((i32::MIN, i32::MAX))
}

/// Greedy pitch refinement. Modifies `voices` in place.
pub fn optimize_counterpoint(
    voices: &mut [Phrase],
    params: &FugueParams,
    ranges: &[(i32, i32)],
    anchors: &[(usize, usize)],
) -> OptimizeStats {
    let anchor_set: HashSet<(usize, usize)> = anchors.iter().copied().collect();

    let initial_cost = score_counterpoint(&*voices, params).total;
    let mut cost = initial_cost;
    let mut passes = 0;
    let mut changes = 0;

    if voices.is_empty() {
        return OptimizeStats {
            passes,
            changes,
            initial_cost,
            final_cost: cost,
        };
    }

    for _ in 0..params.optimizer_passes {
        passes += 1;
        let mut improved = false;

        for v in 0..voices.len() {
            let (lo, hi) = range_for(ranges, v);
            for i in 0..voices[v].len() {
                if anchor_set.contains(&(v, i)) {
                    continue;
                }
                let Some(pitch) = voices[v][i].pitch else {
                    continue;
                };

                // Only the voice under change is cloned; the rest are borrowed.
                let mut candidate = voices[v].clone();
                let mut best_cost = cost;
                let mut best_pitch = None;
                for shift in PROPOSALS {
                    let new_pitch = pitch + shift;
                    if new_pitch < lo || new_pitch > hi {
                        continue;
                    }
                    candidate[i] = candidate[i].with_pitch(new_pitch);
                    let views: Vec<&[Note]> = voices
                        .iter()
                        .enumerate()
                        .map(|(k, voice)| {
                            if k == v {
                                candidate.as_slice()
                            } else {
                                voice.as_slice()
                            }
                        })
                        .collect();
                    let c = score_counterpoint(&views, params).total;
                    if c + IMPROVEMENT_EPSILON < best_cost {
                        best_cost = c;
                        best_pitch = Some(new_pitch);
                    }
                }

                if let Some(p) = best_pitch {
                    voices[v][i] = voices[v][i].with_pitch(p);
                    cost = best_cost;
                    changes += 1;
                    improved = true;
                }
            }
        }

        debug!(pass = passes, changes, cost, "optimizer pass");
        if !improved {
            break;
        }
    }

    OptimizeStats {
        passes,
        changes,
        initial_cost,
        final_cost: cost,
    }
}

/// Repair simultaneous attacks on the same pitch by moving one note an
/// octave (down first, then up) within its range. The higher-numbered voice
/// moves unless that note is anchored. Returns the number of notes moved.
pub fn polish_counterpoint(
    voices: &mut [Phrase],
    params: &FugueParams,
    ranges: &[(i32, i32)],
    anchors: &[(usize, usize)],
) -> usize {
    let anchor_set: HashSet<(usize, usize)> = anchors.iter().copied().collect();
    let mut fixes = 0;

    for _ in 0..params.polish_passes {
        let grid = Grid::from_voices(&*voices, params.grid_resolution);
        let mut pass_fixes = 0;

        for k in 0..grid.num_steps {
            for i in 0..grid.voice_count() {
                for j in (i + 1)..grid.voice_count() {
                    if !grid.is_onset(i, k) || !grid.is_onset(j, k) {
                        continue;
                    }
                    let (Some(ni), Some(nj)) = (grid.cell(i, k).note_index, grid.cell(j, k).note_index)
                    else {
                        continue;
                    };
                    // Re-read pitches: an earlier fix in this pass may have moved one.
                    let (Some(pi), Some(pj)) = (voices[i][ni].pitch, voices[j][nj].pitch) else {
                        continue;
                    };
                    if pi != pj {
                        continue;
                    }

                    let target = [(j, nj), (i, ni)]
                        .into_iter()
                        .find(|cell| !anchor_set.contains(cell));
                    let Some((voice, idx)) = target else {
                        continue;
                    };
                    let (lo, hi) = range_for(ranges, voice);
                    if let Some(new_pitch) = [pi - 12, pi + 12]
                        .into_iter()
                        .find(|p| (lo..=hi).contains(p))
                    {
                        voices[voice][idx] = voices[voice][idx].with_pitch(new_pitch);
                        pass_fixes += 1;
                    }
                }
            }
        }

        debug!(fixes = pass_fixes, "polish pass");
        fixes += pass_fixes;
        if pass_fixes == 0 {
            break;
        }
    }
    fixes
}

/// Fold `pitch` by whole octaves into `[lo, hi]`. A range narrower than an
/// octave may have no matching pitch class; the result is then clamped.
pub fn fold_into_range(pitch: i32, lo: i32, hi: i32) -> i32 {
    if lo > hi {
        return pitch;
    }
    let mut p = pitch;
    if p < lo {
        p += 12 * (lo - p + 11).div_euclid(12);
    }
    if p > hi {
        p -= 12 * (p - hi + 11).div_euclid(12);
    }
    p.clamp(lo, hi)
}

/// Fold every pitch into its voice's range. Returns the number of notes moved.
pub fn enforce_ranges(voices: &mut [Phrase], ranges: &[(i32, i32)]) -> usize {
    let mut moved = 0;
    for (voice, &(lo, hi)) in voices.iter_mut().zip(ranges) {
        for note in voice.iter_mut() {
            if let Some(p) = note.pitch {
                let folded = fold_into_range(p, lo, hi);
                if folded != p {
                    note.pitch = Some(folded);
                    moved += 1;
                }
            }
        }
    }
    moved
}
