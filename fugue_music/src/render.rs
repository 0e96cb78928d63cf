// Fugue rendering: assembles all material into a complete score.
//
// The engine owns the scale mapper and the RNG. A render runs these steps
// against a per-voice timeline whose clocks insert rests automatically when
// material must start later than a voice's current end:
//
// 1. Exposition: each planned entry, with the countersubject in a companion
//    voice from the second entry on.
// 2. Canonic episode: one episode imitated at the fifth (2 beats later) and
//    in contrary motion (4 beats later).
// 3. Re-entries in related keys, each with the countersubject and a short
//    episode in a third voice.
// 4. Stretto, when the configured overlap is large enough.
// 5. Three-part complex episode.
// 6. Final tonic statement with countersubject and cadence.
//
// Each step only runs while the timeline has room before the duration cap.
// Afterwards every voice is padded to a common horizon, then the greedy
// optimizer, the unison polish, and range folding run in that order.
// Exposition entries are anchors the optimizer and polish never touch.
//
// With one voice the engine writes a monophonic melody instead: the subject,
// transposed variations joined by short bridges, and a cadence.

use crate::config::FugueParams;
use crate::episode::{
    generate_cadence, generate_complex_episode, generate_episode, generate_stretto_section,
};
use crate::grid::interval;
use crate::note::{Note, Phrase, Score, first_pitch, phrase_duration};
use crate::optimize::{enforce_ranges, optimize_counterpoint, polish_counterpoint};
use crate::plan::make_entry_plan;
use crate::scale::ScaleMapper;
use crate::subject::{self, generate_countersubject};
use crate::transform::{invert, retrograde, slice_by_time, time_scale, transpose};
use fugue_prng::FugueRng;
use std::ops::Range;
use tracing::{debug, info};

/// Gaps shorter than this are not worth a rest.
const GAP_EPSILON: f64 = 1e-9;

/// Tolerance when checking whether a voice is free at a time.
const FREE_EPSILON: f64 = 1e-6;

/// Key shifts for the middle-section re-entries.
const RELATED_KEYS: [i32; 4] = [7, -5, 2, -10];

/// Short episode length at the default episode density.
const MINI_EPISODE_BEATS: f64 = 8.0;

/// Timeline space reserved for a stretto section.
const STRETTO_SECTION_BEATS: f64 = 12.0;

/// Single-voice variations, as key shifts of the subject.
const MONOPHONIC_SHIFTS: [i32; 3] = [7, -5, 2];

/// Longest cadence `generate_cadence` can produce.
const CADENCE_ROOM_BEATS: f64 = 4.0;

/// Openings that avoid a perfect interval, tried in order.
const OPENING_NUDGES: [i32; 8] = [-2, 2, -1, 1, -3, 3, -4, 4];

/// Per-voice phrases with write-position clocks.
struct Timeline {
    voices: Vec<Phrase>,
    clocks: Vec<f64>,
    anchors: Vec<(usize, usize)>,
}

impl Timeline {
    fn new(voices: usize) -> Self {
        Timeline {
            voices: vec![Vec::new(); voices],
            clocks: vec![0.0; voices],
            anchors: Vec::new(),
        }
    }

    /// Append `material` to `voice` starting at `target`, resting first if the
    /// voice ends earlier. A voice already past `target` continues from its
    /// own clock. Returns the indices of the appended notes.
    fn append_at(&mut self, voice: usize, material: &[Note], target: f64) -> Range<usize> {
        let Some(phrase) = self.voices.get_mut(voice) else {
            return 0..0;
        };
        let mut clock = self.clocks[voice];
        let gap = target - clock;
        if gap > GAP_EPSILON {
            phrase.push(Note::rest(gap));
            clock = target;
        }
        let start = phrase.len();
        phrase.extend_from_slice(material);
        self.clocks[voice] = clock + phrase_duration(material);
        start..phrase.len()
    }

    fn anchor(&mut self, voice: usize, notes: Range<usize>) {
        self.anchors.extend(notes.map(|i| (voice, i)));
    }

    fn is_free(&self, voice: usize, time: f64) -> bool {
        self.clocks[voice] <= time + FREE_EPSILON
    }

    /// Rest-pad every voice to the longest clock.
    fn pad_to_horizon(&mut self) -> f64 {
        let horizon = self.clocks.iter().copied().fold(0.0, f64::max);
        for (phrase, clock) in self.voices.iter_mut().zip(self.clocks.iter_mut()) {
            let gap = horizon - *clock;
            if gap > GAP_EPSILON {
                phrase.push(Note::rest(gap));
                *clock = horizon;
            }
        }
        horizon
    }
}

/// Move the follower's opening note off a unison, fifth, or octave against the
/// leader's opening note, onto the nearest third or sixth.
fn avoid_perfects(leader: &[Note], follower: &[Note]) -> Phrase {
    let mut out = follower.to_vec();
    let (Some(lp), Some(first)) = (
        first_pitch(leader),
        out.iter().position(|n| !n.is_rest()),
    ) else {
        return out;
    };
    let Some(fp) = out[first].pitch else {
        return out;
    };
    if !interval::is_perfect(interval::interval_mod12(lp, fp)) {
        return out;
    }
    if let Some(p) = OPENING_NUDGES
        .iter()
        .map(|d| fp + d)
        .find(|&p| matches!(interval::interval_mod12(lp, p), 3 | 4 | 8 | 9))
    {
        out[first] = out[first].with_pitch(p);
    }
    out
}

/// Companion voice for the countersubject of an exposition entry: the most
/// recently entered voice if it is free at `time`, else any earlier entered
/// voice that is.
fn companion_voice(timeline: &Timeline, entered: &[usize], time: f64) -> Option<usize> {
    entered
        .iter()
        .rev()
        .copied()
        .find(|&v| timeline.is_free(v, time))
}

/// The fugue generator.
///
/// Deterministic for a given seed: `generate_subject` resets the RNG to the
/// seed, and `render` continues the same stream. Not safe to share between
/// concurrent renders; use one engine per thread.
pub struct FugueEngine<M: ScaleMapper> {
    mapper: M,
    seed: u64,
    rng: FugueRng,
}

impl<M: ScaleMapper> FugueEngine<M> {
    pub fn new(mapper: M, seed: u64) -> Self {
        FugueEngine {
            mapper,
            seed,
            rng: FugueRng::new(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Replace the seed and restart the RNG stream.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = FugueRng::new(seed);
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn mapper_mut(&mut self) -> &mut M {
        &mut self.mapper
    }

    /// Generate a subject of `bars` 4/4 bars from a freshly seeded RNG.
    pub fn generate_subject(&mut self, params: &FugueParams, bars: u32) -> Phrase {
        self.rng = FugueRng::new(self.seed);
        subject::generate_subject(&self.mapper, params, bars, &mut self.rng)
    }

    /// Render a complete score from `subject`.
    ///
    /// The result has `params.voice_count()` voices. An empty subject yields
    /// that many empty voices.
    pub fn render(&mut self, subject: &[Note], params: &FugueParams) -> Score {
        let voices = params.voice_count();
        info!(voices, seed = self.seed, "starting fugue generation");

        if subject.is_empty() {
            return Score::from_voices(vec![Vec::new(); voices]);
        }
        if voices == 1 {
            return self.render_monophonic(subject, params);
        }

        let max = params.max_duration_beats;
        let subject_len = phrase_duration(subject);
        let entries = make_entry_plan(subject, params);
        let countersubject = generate_countersubject(subject, &self.mapper, &mut self.rng);
        let mut timeline = Timeline::new(voices);

        // Exposition
        let mut entered: Vec<usize> = Vec::with_capacity(entries.len());
        for entry in &entries {
            let placed = timeline.append_at(entry.voice_index, &entry.material, entry.start_time);
            timeline.anchor(entry.voice_index, placed);

            if !countersubject.is_empty() {
                if let Some(companion) = companion_voice(&timeline, &entered, entry.start_time) {
                    let counter = avoid_perfects(&entry.material, &countersubject);
                    timeline.append_at(companion, &counter, entry.start_time);
                }
            }
            entered.push(entry.voice_index);
        }
        let exposition_end = entries
            .iter()
            .map(|e| e.start_time + phrase_duration(&e.material))
            .fold(0.0, f64::max);
        let mut current = exposition_end;

        // Canonic episode
        if current < max - 32.0 {
            let length = (max - current - 24.0).min(16.0);
            let episode = generate_episode(subject, length, &mut self.rng);
            if !episode.is_empty() {
                timeline.append_at(0, &episode, current);
                if voices >= 2 {
                    timeline.append_at(1, &transpose(&episode, 7), current + 2.0);
                }
                if voices >= 3 {
                    let axis = first_pitch(subject).unwrap_or(params.tonic);
                    timeline.append_at(2, &invert(&episode, axis), current + 4.0);
                }
                current += length;
            }
        }

        // Re-entries in related keys
        let mini_length = MINI_EPISODE_BEATS * (0.5 + params.episode_density.clamp(0.0, 1.0));
        for (i, &shift) in RELATED_KEYS.iter().enumerate() {
            if current >= max - 16.0 {
                break;
            }
            let entry_voice = i % voices;
            let moved = transpose(subject, shift);
            timeline.append_at(entry_voice, &moved, current);
            if !countersubject.is_empty() {
                let counter = avoid_perfects(&moved, &countersubject);
                timeline.append_at((entry_voice + 1) % voices, &counter, current);
            }
            current += subject_len + 2.0;

            if i < RELATED_KEYS.len() - 1 && current < max - 20.0 {
                let mini = generate_episode(subject, mini_length, &mut self.rng);
                if !mini.is_empty() {
                    timeline.append_at((entry_voice + 2) % voices, &mini, current);
                    current += mini_length;
                }
            }
        }

        // Stretto
        if params.overlap() > 0.1 && current < max - 20.0 {
            let stretto = generate_stretto_section(subject, params, &mut self.rng);
            debug!(entries = stretto.len(), start = current, "stretto");
            for entry in &stretto {
                timeline.append_at(entry.voice_index, &entry.material, current + entry.start_time);
            }
            current += STRETTO_SECTION_BEATS;
        }

        // Complex episode
        if current < max - 16.0 {
            let length = (max - current - 8.0).min(12.0);
            let parts = generate_complex_episode(subject, length, &mut self.rng);
            if !parts.is_empty() {
                for (i, part) in parts.iter().take(voices).enumerate() {
                    timeline.append_at(i, part, current + i as f64);
                }
                current += length;
            }
        }

        // Final statement and cadence
        if current < max - subject_len {
            timeline.append_at(0, subject, current);
            if !countersubject.is_empty() {
                let counter = avoid_perfects(subject, &countersubject);
                timeline.append_at(1, &counter, current);
            }
            let cadence = generate_cadence(&self.mapper, params.tonic, &mut self.rng);
            let cadence_voice = if voices > 2 { 2 } else { 0 };
            timeline.append_at(cadence_voice, &cadence, current + subject_len);
        }

        let horizon = timeline.pad_to_horizon();
        let ranges = params.voice_ranges(voices);
        let Timeline {
            voices: mut parts,
            anchors,
            ..
        } = timeline;

        let stats = optimize_counterpoint(&mut parts, params, &ranges, &anchors);
        let polished = polish_counterpoint(&mut parts, params, &ranges, &anchors);
        let folded = enforce_ranges(&mut parts, &ranges);

        info!(
            voices,
            entries = entries.len(),
            sections_end = current,
            horizon,
            changes = stats.changes,
            polished,
            folded,
            cost = stats.final_cost,
            "fugue generated"
        );
        Score::from_voices(parts)
    }

    /// Single-voice melody: subject, variations with short bridges, cadence.
    fn render_monophonic(&mut self, subject: &[Note], params: &FugueParams) -> Score {
        let cap = params.monophonic_max_beats;
        let subject_len = phrase_duration(subject);

        let mut variations: Vec<Phrase> = MONOPHONIC_SHIFTS
            .iter()
            .map(|&shift| transpose(subject, shift))
            .collect();
        if params.allow_inversion {
            if let Some(axis) = first_pitch(subject) {
                variations.push(invert(subject, axis));
            }
        }
        if params.allow_retrograde {
            variations.push(retrograde(subject));
        }
        if params.allow_augmentation {
            variations.push(time_scale(subject, 2.0));
        }
        if params.allow_diminution {
            variations.push(time_scale(subject, 0.5));
        }

        let mut melody = subject.to_vec();
        let mut current = subject_len;
        let bridge = slice_by_time(subject, 0.0, (subject_len / 2.0).min(2.0));
        let bridge_len = phrase_duration(&bridge);
        let mut placed = 0;
        for variation in &variations {
            let joined = if placed > 0 { bridge_len } else { 0.0 };
            if current + joined + phrase_duration(variation) + CADENCE_ROOM_BEATS > cap {
                debug!(current, cap, "variation skipped, no room before cadence");
                continue;
            }
            if placed > 0 && !bridge.is_empty() {
                let shift = self.rng.pick(&[2, -2, 5, -5]);
                let connecting = transpose(&bridge, shift);
                current += phrase_duration(&connecting);
                melody.extend(connecting);
            }
            current += phrase_duration(variation);
            melody.extend_from_slice(variation);
            placed += 1;
        }

        if current + CADENCE_ROOM_BEATS <= cap {
            melody.extend(generate_cadence(&self.mapper, params.tonic, &mut self.rng));
        }

        info!(
            duration = phrase_duration(&melody),
            notes = melody.len(),
            "monophonic melody generated"
        );
        Score::from_voices(vec![melody])
    }
}
