// Continuous fugue playback controller.
//
// `FugueSequencer` plays generated fugues back to back for a host that calls
// `step` once per sixteenth note. When no piece is playing and the rest period
// since the last one has elapsed, it derives fresh `FugueParams` from its
// `SequencerSettings`, generates a one-bar subject, renders, and starts a
// `PlaybackCursor`. A piece ends when every voice is exhausted or when it has
// run longer than `max_piece_secs`.
//
// Time is injected: every call passes `now_secs` from the host's clock, so the
// controller itself never reads a clock. Each piece gets its own engine seed,
// drawn from a sequencer RNG, so the whole session is reproducible from one
// seed while consecutive pieces differ.

use crate::config::SequencerSettings;
use crate::error::ConfigError;
use crate::note::Score;
use crate::playback::{PlaybackCursor, ScheduledNote};
use crate::render::FugueEngine;
use crate::scale::{ScaleMapper, ScaleTable};
use fugue_prng::FugueRng;
use tracing::{debug, info};

struct ActivePiece {
    cursor: PlaybackCursor,
    started_at: f64,
}

pub struct FugueSequencer<M: ScaleMapper> {
    engine: FugueEngine<M>,
    settings: SequencerSettings,
    seeds: FugueRng,
    active: Option<ActivePiece>,
    last_piece_end: Option<f64>,
    pieces_started: u64,
}

impl<M: ScaleMapper> FugueSequencer<M> {
    pub fn new(mapper: M, seed: u64, settings: SequencerSettings) -> Self {
        info!(seed, voices = settings.voices, "fugue sequencer initialized");
        FugueSequencer {
            engine: FugueEngine::new(mapper, seed),
            settings,
            seeds: FugueRng::new(seed),
            active: None,
            last_piece_end: None,
            pieces_started: 0,
        }
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    /// New settings take effect from the next piece (tempo from the next step).
    pub fn set_settings(&mut self, settings: SequencerSettings) {
        self.settings = settings;
    }

    pub fn engine_mut(&mut self) -> &mut FugueEngine<M> {
        &mut self.engine
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    pub fn pieces_started(&self) -> u64 {
        self.pieces_started
    }

    /// The score currently playing, if any.
    pub fn current_score(&self) -> Option<&Score> {
        self.active.as_ref().map(|piece| piece.cursor.score())
    }

    /// Generate and start a new piece now, replacing any piece in progress.
    pub fn start_piece(&mut self, now_secs: f64) {
        let seed = self.seeds.next_u64();
        self.engine.reseed(seed);

        let params = self.settings.to_params();
        let subject = self.engine.generate_subject(&params, 1);
        let score = self.engine.render(&subject, &params);
        self.pieces_started += 1;
        info!(
            piece = self.pieces_started,
            seed,
            voices = score.voice_count(),
            notes = score.note_count(),
            "piece started"
        );

        self.active = Some(ActivePiece {
            cursor: PlaybackCursor::new(score),
            started_at: now_secs,
        });
    }

    fn finish_piece(&mut self, now_secs: f64) {
        self.active = None;
        self.last_piece_end = Some(now_secs);
    }

    /// Advance playback by one sixteenth and return the notes to sound now.
    pub fn step(&mut self, now_secs: f64) -> Vec<ScheduledNote> {
        if let Some(piece) = &self.active {
            let elapsed = now_secs - piece.started_at;
            if elapsed >= self.settings.max_piece_secs {
                info!(elapsed, "piece cut off at maximum duration");
                self.finish_piece(now_secs);
                return Vec::new();
            }
        }

        if self.active.is_none() {
            let rest = self.settings.rest_between_pieces_secs;
            let rested = self
                .last_piece_end
                .is_none_or(|end| now_secs - end >= rest);
            if !rested {
                debug!("waiting for rest period");
                return Vec::new();
            }
            self.start_piece(now_secs);
        }

        let bpm = self.settings.bpm;
        let Some(piece) = self.active.as_mut() else {
            return Vec::new();
        };
        let notes = piece.cursor.tick(bpm);
        if piece.cursor.is_exhausted() {
            info!(
                musical_time = piece.cursor.musical_time(),
                "piece completed"
            );
            self.finish_piece(now_secs);
        }
        notes
    }
}

impl FugueSequencer<ScaleTable> {
    /// Build a sequencer whose scale follows `settings.root_note` and
    /// `settings.scale_mode`.
    pub fn with_settings(seed: u64, settings: SequencerSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let table = ScaleTable::from_name(&settings.scale_mode, settings.root_note)?;
        Ok(FugueSequencer::new(table, seed, settings))
    }

    /// Replace the settings and rebuild the scale table from them.
    pub fn retune(&mut self, settings: SequencerSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        let table = ScaleTable::from_name(&settings.scale_mode, settings.root_note)?;
        *self.engine.mapper_mut() = table;
        self.settings = settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::Scale;

    const STEP_SECS: f64 = 0.125;

    fn sequencer() -> FugueSequencer<ScaleTable> {
        let settings = SequencerSettings {
            voices: 2,
            bpm: 120.0,
            ..SequencerSettings::default()
        };
        FugueSequencer::with_settings(21, settings).unwrap()
    }

    /// Step until the current piece ends; returns the time it ended.
    fn play_out(seq: &mut FugueSequencer<ScaleTable>, mut now: f64) -> f64 {
        let mut steps = 0;
        while seq.is_playing() {
            seq.step(now);
            now += STEP_SECS;
            steps += 1;
            assert!(steps < 10_000, "piece never finished");
        }
        now
    }

    #[test]
    fn test_first_step_starts_piece() {
        let mut seq = sequencer();
        assert!(!seq.is_playing());
        seq.step(0.0);
        assert!(seq.is_playing());
        assert_eq!(seq.pieces_started(), 1);
        assert_eq!(seq.current_score().unwrap().voice_count(), 2);
    }

    #[test]
    fn test_rest_between_pieces() {
        let mut seq = sequencer();
        seq.step(0.0);
        let first = seq.current_score().cloned().unwrap();
        let end = play_out(&mut seq, STEP_SECS);

        assert!(seq.step(end + 1.0).is_empty());
        assert!(!seq.is_playing());
        assert_eq!(seq.pieces_started(), 1);

        seq.step(end + 10.5);
        assert!(seq.is_playing());
        assert_eq!(seq.pieces_started(), 2);
        assert_ne!(seq.current_score().unwrap(), &first);
    }

    #[test]
    fn test_long_piece_cut_off() {
        let mut seq = sequencer();
        let mut settings = seq.settings().clone();
        settings.max_piece_secs = 1.0;
        seq.set_settings(settings);

        seq.step(0.0);
        assert!(seq.is_playing());
        seq.step(0.5);
        assert!(seq.is_playing());
        assert!(seq.step(1.0).is_empty());
        assert!(!seq.is_playing());
    }

    #[test]
    fn test_notes_carry_voice_and_seconds() {
        let mut seq = sequencer();
        let mut now = 0.0;
        let mut heard = Vec::new();
        while heard.len() < 8 && now < 60.0 {
            heard.extend(seq.step(now));
            now += STEP_SECS;
        }
        assert!(!heard.is_empty());
        for note in &heard {
            assert!(note.voice < 2);
            assert!(note.duration_secs > 0.0);
            assert!(note.velocity > 0);
        }
    }

    #[test]
    fn test_retune_changes_scale() {
        let mut seq = sequencer();
        let settings = SequencerSettings {
            root_note: 62,
            scale_mode: "dorian".to_string(),
            ..seq.settings().clone()
        };
        seq.retune(settings).unwrap();
        assert_eq!(seq.engine_mut().mapper().scale, Scale::Dorian);
        assert_eq!(seq.engine_mut().mapper().root, 62);

        let bad = SequencerSettings {
            scale_mode: "nonsense".to_string(),
            ..SequencerSettings::default()
        };
        assert!(matches!(seq.retune(bad), Err(ConfigError::UnknownScale(_))));

        let silent = SequencerSettings {
            bpm: 0.0,
            ..SequencerSettings::default()
        };
        assert!(matches!(seq.retune(silent.clone()), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            FugueSequencer::<ScaleTable>::with_settings(1, silent),
            Err(ConfigError::Invalid(_))
        ));
    }
}
