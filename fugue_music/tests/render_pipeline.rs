// End-to-end tests for the rendering pipeline.
//
// Each test drives the public API the way the CLI and the sequencer do:
// build a scale table, generate or hand-write a subject, render a score, and
// check structural properties of the result (voice count, entry placement,
// common horizon, ranges, determinism, playback).

use fugue_music::config::FugueParams;
use fugue_music::note::{DURATION_EPSILON, Note, Phrase, Score, phrase_duration};
use fugue_music::playback::PlaybackCursor;
use fugue_music::render::FugueEngine;
use fugue_music::scale::{ScaleMapper, ScaleTable};
use fugue_music::scoring::score_counterpoint;

/// Quarter notes on scale degrees 0, 1, 2, 0 of `mapper`.
fn degree_subject(mapper: &ScaleTable) -> Phrase {
    [0, 1, 2, 0]
        .iter()
        .map(|&d| Note::pitched(mapper.get_note(d, 0).unwrap() as i32, 1.0, 96))
        .collect()
}

fn first_sounding_start(voice: &[Note]) -> Option<(f64, i32)> {
    let mut t = 0.0;
    for note in voice {
        if let Some(p) = note.pitch {
            return Some((t, p));
        }
        t += note.duration;
    }
    None
}

fn assert_common_horizon(score: &Score) {
    let horizon = score.horizon();
    for (i, voice) in score.voices().iter().enumerate() {
        assert!(
            (phrase_duration(voice) - horizon).abs() < DURATION_EPSILON,
            "voice {i} ends at {} but horizon is {horizon}",
            phrase_duration(voice)
        );
    }
}

#[test]
fn two_voice_exposition_places_answer_at_entry_gap() {
    let mapper = ScaleTable::c_major();
    let subject = degree_subject(&mapper);
    for gap in [4.0, 6.0] {
        let params = FugueParams {
            n_voices: 2,
            mode: "major".to_string(),
            stretto_overlap: 0.0,
            entry_gap_beats: Some(gap),
            // The default soprano range starts at 72, and range folding runs
            // last, so middle C would come out an octave higher. Widen the
            // ranges to keep the subject at its written pitch.
            ranges: Some(vec![(55, 84), (43, 72)]),
            ..FugueParams::default()
        };
        let mut engine = FugueEngine::new(mapper, 11);
        let score = engine.render(&subject, &params);

        assert_eq!(score.voice_count(), 2);
        let tonic = mapper.get_note(0, 0).unwrap() as i32;
        assert_eq!(score.voices()[0][0].pitch, Some(tonic));

        let (start, _) = first_sounding_start(&score.voices()[1]).unwrap();
        assert!(
            (start - gap).abs() < DURATION_EPSILON,
            "voice 1 entered at {start}, expected {gap}"
        );
        assert_common_horizon(&score);
    }
}

#[test]
fn default_ranges_fold_low_opening_into_soprano() {
    let mapper = ScaleTable::c_major();
    let subject = degree_subject(&mapper);
    let params = FugueParams {
        n_voices: 2,
        mode: "major".to_string(),
        entry_gap_beats: Some(4.0),
        ..FugueParams::default()
    };
    let mut engine = FugueEngine::new(mapper, 11);
    let score = engine.render(&subject, &params);
    assert_eq!(score.voices()[0][0].pitch, Some(72));
}

#[test]
fn rendered_voices_share_horizon() {
    for voices in 2..=4 {
        let mapper = ScaleTable::from_name("minor", 60).unwrap();
        let params = FugueParams {
            n_voices: voices,
            ..FugueParams::default()
        };
        let mut engine = FugueEngine::new(mapper, 1234 + voices as u64);
        let subject = engine.generate_subject(&params, 1);
        let score = engine.render(&subject, &params);

        assert_eq!(score.voice_count(), voices);
        assert!(score.horizon() > phrase_duration(&subject));
        assert_common_horizon(&score);
    }
}

#[test]
fn rendering_is_deterministic_per_seed() {
    let params = FugueParams::default();
    let render = |seed: u64| {
        let mut engine = FugueEngine::new(ScaleTable::from_name("minor", 60).unwrap(), seed);
        let subject = engine.generate_subject(&params, 2);
        engine.render(&subject, &params)
    };
    assert_eq!(render(77), render(77));
    assert_ne!(render(77), render(78));
}

#[test]
fn rendered_pitches_stay_in_voice_ranges() {
    let params = FugueParams {
        n_voices: 4,
        tonic: 62,
        mode: "dorian".to_string(),
        stretto_overlap: 0.5,
        ..FugueParams::default()
    };
    let mut engine = FugueEngine::new(ScaleTable::from_name("dorian", 62).unwrap(), 9);
    let subject = engine.generate_subject(&params, 1);
    let score = engine.render(&subject, &params);
    let ranges = params.voice_ranges(4);

    for (voice, &(lo, hi)) in score.voices().iter().zip(&ranges) {
        for note in voice {
            if let Some(p) = note.pitch {
                assert!((lo..=hi).contains(&p), "pitch {p} outside {lo}..={hi}");
            }
        }
    }
}

#[test]
fn single_voice_renders_melody_starting_with_subject() {
    let mapper = ScaleTable::c_major();
    let subject = degree_subject(&mapper);
    let params = FugueParams {
        n_voices: 1,
        mode: "major".to_string(),
        ..FugueParams::default()
    };
    let mut engine = FugueEngine::new(mapper, 5);
    let score = engine.render(&subject, &params);

    assert_eq!(score.voice_count(), 1);
    let melody = &score.voices()[0];
    assert!(melody.len() > subject.len());
    assert_eq!(&melody[..subject.len()], subject.as_slice());
    assert!(score.horizon() <= params.monophonic_max_beats);
}

#[test]
fn empty_subject_renders_empty_voices() {
    let params = FugueParams::default();
    let mut engine = FugueEngine::new(ScaleTable::c_major(), 3);
    let score = engine.render(&[], &params);
    assert_eq!(score.voice_count(), 3);
    assert!(score.is_empty());
    assert_eq!(score.note_count(), 0);
}

#[test]
fn counterpoint_cost_is_finite_for_rendered_score() {
    let params = FugueParams::default();
    let mut engine = FugueEngine::new(ScaleTable::from_name("minor", 60).unwrap(), 40);
    let subject = engine.generate_subject(&params, 1);
    let score = engine.render(&subject, &params);
    let cost = score_counterpoint(score.voices(), &params);
    assert!(cost.total.is_finite());
    assert!(cost.parallel >= 0.0 && cost.dissonance >= 0.0 && cost.crossing >= 0.0);
}

#[test]
fn playback_emits_every_sounding_note() {
    let params = FugueParams {
        n_voices: 3,
        ..FugueParams::default()
    };
    let mut engine = FugueEngine::new(ScaleTable::from_name("minor", 57).unwrap(), 2024);
    let subject = engine.generate_subject(&params, 1);
    let score = engine.render(&subject, &params);
    let sounding: usize = score
        .voices()
        .iter()
        .map(|v| v.iter().filter(|n| !n.is_rest()).count())
        .sum();

    let max_ticks = (score.horizon() / 0.25).ceil() as usize + 8;
    let mut cursor = PlaybackCursor::new(score);
    let mut played = 0;
    let mut ticks = 0;
    while !cursor.is_exhausted() {
        played += cursor.tick(120.0).len();
        ticks += 1;
        assert!(ticks <= max_ticks, "playback did not finish");
    }
    assert_eq!(played, sounding);
}
