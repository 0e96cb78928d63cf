// Exposition planning: which voice enters when, with subject or answer.
//
// Voices enter one after another, `gap` quarter notes apart. Even-indexed
// voices state the subject, odd-indexed voices the answer. A single-voice plan
// is just the subject. Entries are consumed by render.rs, which places them on
// the per-voice timeline; they are not part of the final score.

use crate::config::FugueParams;
use crate::note::{Note, Phrase, phrase_duration};
use crate::subject::answer_for;

/// One planned statement of the subject or answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Voice that states the material.
    pub voice_index: usize,
    /// Start time in quarter notes from the beginning of the section.
    pub start_time: f64,
    pub material: Phrase,
    /// True for the subject, false for the answer.
    pub is_subject: bool,
}

/// Distance between exposition entries: the explicit gap if configured,
/// otherwise the subject length shortened by the stretto overlap.
pub fn entry_gap(subject: &[Note], params: &FugueParams) -> f64 {
    match params.entry_gap_beats {
        Some(gap) if gap > 0.0 => gap,
        _ => phrase_duration(subject) * (1.0 - params.overlap()),
    }
}

/// Build the exposition entry plan.
pub fn make_entry_plan(subject: &[Note], params: &FugueParams) -> Vec<Entry> {
    let voices = params.voice_count();
    if voices == 1 {
        return vec![Entry {
            voice_index: 0,
            start_time: 0.0,
            material: subject.to_vec(),
            is_subject: true,
        }];
    }

    let gap = entry_gap(subject, params);
    let answer = answer_for(subject, params);
    (0..voices)
        .map(|v| {
            let is_subject = v % 2 == 0;
            Entry {
                voice_index: v,
                start_time: v as f64 * gap,
                material: if is_subject {
                    subject.to_vec()
                } else {
                    answer.clone()
                },
                is_subject,
            }
        })
        .collect()
}
