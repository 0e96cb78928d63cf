// Counterpoint cost: a weighted penalty sum over a quantized score.
//
// Lower is better. Terms, each counted per grid step and voice pair:
//
// - parallel: both voices move the same way from one perfect interval to
//   another (consecutive fifths/octaves).
// - direct: similar motion into a perfect interval with at least one voice
//   leaping more than a whole step; heavier on strong beats.
// - dissonance: a non-consonant interval sounding on a strong beat.
// - crossing: a lower-numbered voice sounding above a higher-numbered one,
//   counted per step.
// - smoothness: a reward of minus the total melodic motion per voice; its
//   weight is negative, so leaping lines cost more.
// - hard unison: two voices attacking the same pitch together. Fixed cost,
//   not weighted.
//
// The last two beats form a cadence window in which the penalties above are
// discounted (to a quarter) and hard unisons are waived.
//
// Consumed by optimize.rs for greedy refinement, and by the CLI for reporting.

use crate::config::{CounterpointWeights, FugueParams};
use crate::grid::{Grid, interval};
use crate::note::Note;
use serde::Serialize;

/// Length of the relaxed window at the end of the piece.
pub const CADENCE_WINDOW_BEATS: f64 = 2.0;

/// Discount applied to penalties inside the cadence window.
const CADENCE_RELAXATION: f64 = 0.25;

/// Extra weight for direct perfects arriving on a strong beat.
const STRONG_BEAT_DIRECT: f64 = 1.5;

/// Fixed cost of a simultaneous attack on the same pitch.
pub const HARD_UNISON_PENALTY: f64 = 5.0;

/// Unweighted counts per term, plus the weighted total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub parallel: f64,
    pub direct: f64,
    pub dissonance: f64,
    pub crossing: f64,
    /// Total absolute semitone motion between consecutive sounding steps.
    pub melodic_motion: f64,
    pub hard_unison: f64,
    pub total: f64,
}

impl CostBreakdown {
    /// The smoothness reward: smoother lines give a larger (less negative) value.
    pub fn smoothness(&self) -> f64 {
        -self.melodic_motion
    }
}

/// Score a set of voices with the weights and grid resolution in `params`.
pub fn score_counterpoint<V: AsRef<[Note]>>(voices: &[V], params: &FugueParams) -> CostBreakdown {
    let grid = Grid::from_voices(voices, params.grid_resolution);
    score_grid(&grid, &params.weights)
}

/// Score an already-quantized grid.
pub fn score_grid(grid: &Grid, weights: &CounterpointWeights) -> CostBreakdown {
    let mut cost = CostBreakdown {
        melodic_motion: score_motion(grid),
        ..CostBreakdown::default()
    };

    let steps = grid.num_steps;
    let cadence_start = steps.saturating_sub(grid.steps_for_beats(CADENCE_WINDOW_BEATS));
    let relax = |step: usize| {
        if step >= cadence_start {
            CADENCE_RELAXATION
        } else {
            1.0
        }
    };

    for k in 0..steps.saturating_sub(1) {
        score_vertical(grid, k, relax(k), k >= cadence_start, &mut cost);
        score_transition(grid, k, relax(k + 1), &mut cost);
    }

    cost.total = weights.parallel * cost.parallel
        + weights.direct * cost.direct
        + weights.dissonance * cost.dissonance
        + weights.crossing * cost.crossing
        + weights.smoothness * cost.smoothness()
        + cost.hard_unison;
    cost
}

/// Sum of melodic steps between consecutive sounding grid steps. Held notes
/// contribute nothing; a rest breaks the line.
fn score_motion(grid: &Grid) -> f64 {
    let mut motion = 0.0;
    for row in &grid.voices {
        for pair in row.windows(2) {
            if let (Some(a), Some(b)) = (pair[0].pitch, pair[1].pitch) {
                motion += interval::semitones(a, b).abs() as f64;
            }
        }
    }
    motion
}

/// Crossing, strong-beat dissonance, and onset unisons at one step.
fn score_vertical(grid: &Grid, k: usize, relax: f64, in_cadence: bool, cost: &mut CostBreakdown) {
    let strong = grid.is_strong_step(k);
    let voices = grid.voice_count();
    for i in 0..voices {
        for j in (i + 1)..voices {
            let (Some(a), Some(b)) = (grid.sounding_pitch(i, k), grid.sounding_pitch(j, k)) else {
                continue;
            };

            if a > b {
                cost.crossing += 1.0;
            }

            if strong && interval::is_dissonant(interval::interval_mod12(a, b)) {
                cost.dissonance += relax;
            }

            if a == b && grid.is_onset(i, k) && grid.is_onset(j, k) && !in_cadence {
                cost.hard_unison += HARD_UNISON_PENALTY;
            }
        }
    }
}

/// Parallel and direct perfects between step `k` and `k + 1`.
fn score_transition(grid: &Grid, k: usize, relax: f64, cost: &mut CostBreakdown) {
    let strong_arrival = grid.is_strong_step(k + 1);
    let voices = grid.voice_count();
    for i in 0..voices {
        for j in (i + 1)..voices {
            let (Some(a0), Some(a1), Some(b0), Some(b1)) = (
                grid.sounding_pitch(i, k),
                grid.sounding_pitch(i, k + 1),
                grid.sounding_pitch(j, k),
                grid.sounding_pitch(j, k + 1),
            ) else {
                continue;
            };

            let da = interval::semitones(a0, a1);
            let db = interval::semitones(b0, b1);
            let same_direction = (da > 0 && db > 0) || (da < 0 && db < 0);
            if !same_direction {
                continue;
            }

            let before = interval::interval_mod12(a0, b0);
            let after = interval::interval_mod12(a1, b1);

            if interval::is_perfect(before) && interval::is_perfect(after) {
                cost.parallel += relax;
            }

            if interval::is_perfect(after) && (da.abs() > 2 || db.abs() > 2) {
                let weight = if strong_arrival { STRONG_BEAT_DIRECT } else { 1.0 };
                cost.direct += weight * relax;
            }
        }
    }
}
