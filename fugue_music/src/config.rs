// Data-driven configuration for fugue generation.
//
// `FugueParams` is the immutable per-render parameter set: voice count, key,
// answer style, permitted transformations, counterpoint weights, voice ranges,
// and the render budget knobs. `GeneratorConfig` wraps it with the CLI's
// seed/tempo/subject length, and `SequencerSettings` is the live state the
// playback controller (sequencer.rs) turns into fresh params for every piece.
//
// All structs are plain serde types with `Default` impls and per-field
// defaults, so a JSON file only needs the keys it wants to override.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default absolute voice ranges (soprano, alto, tenor, bass) for tonic 60.
pub const DEFAULT_VOICE_RANGES: [(i32, i32); 4] = [(72, 88), (65, 81), (57, 74), (48, 67)];

/// Maximum number of voices the engine will write.
pub const MAX_VOICES: usize = 4;

/// Weights for the counterpoint cost terms (see scoring.rs).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterpointWeights {
    /// Parallel fifths/octaves between consecutive grid steps.
    pub parallel: f64,
    /// Similar motion with a leap into a perfect interval.
    pub direct: f64,
    /// Dissonant vertical intervals on strong beats.
    pub dissonance: f64,
    /// Voice-order inversions per step.
    pub crossing: f64,
    /// Multiplies the smoothness reward; negative so that smoother lines cost less.
    pub smoothness: f64,
}

impl Default for CounterpointWeights {
    fn default() -> Self {
        CounterpointWeights {
            parallel: 5.0,
            direct: 2.5,
            dissonance: 3.0,
            crossing: 1.0,
            smoothness: -1.0,
        }
    }
}

/// Parameters for one fugue render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FugueParams {
    /// Requested voices. Clamped to 1..=4 by `voice_count()`.
    pub n_voices: usize,
    /// Tonic MIDI pitch.
    pub tonic: i32,
    /// Scale name understood by `Scale::from_name`.
    pub mode: String,
    /// Distance between exposition entries. Defaults to the subject length
    /// shortened by the stretto overlap.
    pub entry_gap_beats: Option<f64>,
    /// Fraction (0..1) of the subject that stretto entries overlap.
    pub stretto_overlap: f64,
    /// Tonal (true) or real (false) answer.
    pub use_tonal_answer: bool,
    pub allow_inversion: bool,
    pub allow_retrograde: bool,
    pub allow_augmentation: bool,
    pub allow_diminution: bool,
    /// 0..1; scales the length of the short episodes between re-entries.
    pub episode_density: f64,
    /// Carried for the host application; the renderer does not read it.
    pub cadence_every_measures: u32,
    pub weights: CounterpointWeights,
    /// Absolute per-voice `(low, high)` pitch ranges. Used only when it covers
    /// every voice; otherwise the defaults are shifted by `tonic - 60`.
    pub ranges: Option<Vec<(i32, i32)>>,
    /// Timeline cap for multi-voice fugues (quarter notes).
    pub max_duration_beats: f64,
    /// Timeline cap for single-voice melodies (quarter notes).
    pub monophonic_max_beats: f64,
    /// Scoring grid step in quarter notes (0.25 = sixteenths).
    pub grid_resolution: f64,
    pub optimizer_passes: usize,
    pub polish_passes: usize,
}

impl Default for FugueParams {
    fn default() -> Self {
        FugueParams {
            n_voices: 3,
            tonic: 60,
            mode: "minor".to_string(),
            entry_gap_beats: None,
            stretto_overlap: 0.0,
            use_tonal_answer: true,
            allow_inversion: false,
            allow_retrograde: false,
            allow_augmentation: false,
            allow_diminution: false,
            episode_density: 0.5,
            cadence_every_measures: 4,
            weights: CounterpointWeights::default(),
            ranges: None,
            // 5 minutes at 120 BPM
            max_duration_beats: 150.0,
            // 3 minutes at 120 BPM
            monophonic_max_beats: 90.0,
            grid_resolution: 0.25,
            optimizer_passes: 1,
            polish_passes: 1,
        }
    }
}

impl FugueParams {
    /// Number of voices actually rendered.
    pub fn voice_count(&self) -> usize {
        self.n_voices.clamp(1, MAX_VOICES)
    }

    /// Stretto overlap clamped into [0, 1).
    pub fn overlap(&self) -> f64 {
        self.stretto_overlap.clamp(0.0, 0.99)
    }

    /// Absolute `(low, high)` range for each of `voices` voices.
    pub fn voice_ranges(&self, voices: usize) -> Vec<(i32, i32)> {
        if let Some(ranges) = &self.ranges {
            if ranges.len() >= voices {
                return ranges[..voices].to_vec();
            }
        }
        let offset = self.tonic - 60;
        DEFAULT_VOICE_RANGES
            .iter()
            .cycle()
            .take(voices)
            .map(|&(lo, hi)| (lo + offset, hi + offset))
            .collect()
    }

    /// Check values a JSON file could get wrong.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=127).contains(&self.tonic) {
            return Err(ConfigError::Invalid(format!(
                "tonic {} outside 0..=127",
                self.tonic
            )));
        }
        if self.grid_resolution <= 0.0 {
            return Err(ConfigError::Invalid(
                "grid_resolution must be positive".to_string(),
            ));
        }
        if let Some(gap) = self.entry_gap_beats {
            if gap < 0.0 {
                return Err(ConfigError::Invalid(
                    "entry_gap_beats must not be negative".to_string(),
                ));
            }
        }
        if let Some(ranges) = &self.ranges {
            if let Some(&(lo, hi)) = ranges.iter().find(|&&(lo, hi)| hi - lo < 12) {
                return Err(ConfigError::Invalid(format!(
                    "voice range ({lo}, {hi}) is narrower than an octave"
                )));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: FugueParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }
}

/// Top-level configuration for the `fugue` CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Engine seed; a random one is drawn from the clock when absent.
    pub seed: Option<u64>,
    /// Tempo written into MIDI output.
    pub bpm: f64,
    /// Subject length in 4/4 bars.
    pub subject_bars: u32,
    pub params: FugueParams,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            seed: None,
            bpm: 120.0,
            subject_bars: 1,
            params: FugueParams::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GeneratorConfig = serde_json::from_str(json)?;
        if config.bpm <= 0.0 {
            return Err(ConfigError::Invalid("bpm must be positive".to_string()));
        }
        config.params.validate()?;
        Ok(config)
    }
}

/// Live settings the sequencer reads when it starts a new piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSettings {
    pub voices: usize,
    pub root_note: u8,
    pub scale_mode: String,
    /// 0..1; drives stretto overlap and episode density.
    pub density: f64,
    pub bpm: f64,
    /// Silence between pieces.
    pub rest_between_pieces_secs: f64,
    /// A piece still playing after this long is cut off.
    pub max_piece_secs: f64,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        SequencerSettings {
            voices: 3,
            root_note: 60,
            scale_mode: "minor".to_string(),
            density: 0.5,
            bpm: 110.0,
            rest_between_pieces_secs: 10.0,
            max_piece_secs: 300.0,
        }
    }
}

impl SequencerSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: SequencerSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Playback divides by `bpm`, so it must be a positive finite number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "bpm {} must be positive",
                self.bpm
            )));
        }
        if self.root_note > 127 {
            return Err(ConfigError::Invalid(format!(
                "root_note {} outside 0..=127",
                self.root_note
            )));
        }
        Ok(())
    }

    /// Params for the next piece, derived the same way for every piece.
    pub fn to_params(&self) -> FugueParams {
        let density = self.density.clamp(0.0, 1.0);
        FugueParams {
            n_voices: self.voices.clamp(1, MAX_VOICES),
            tonic: self.root_note as i32,
            mode: self.scale_mode.clone(),
            entry_gap_beats: Some(2.0),
            stretto_overlap: density * 0.5,
            use_tonal_answer: true,
            episode_density: density,
            ..FugueParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_count_clamped() {
        let mut params = FugueParams::default();
        params.n_voices = 0;
        assert_eq!(params.voice_count(), 1);
        params.n_voices = 9;
        assert_eq!(params.voice_count(), 4);
        params.n_voices = 2;
        assert_eq!(params.voice_count(), 2);
    }

    #[test]
    fn test_default_ranges_follow_tonic() {
        let params = FugueParams {
            tonic: 62,
            ..FugueParams::default()
        };
        assert_eq!(params.voice_ranges(2), vec![(74, 90), (67, 83)]);
    }

    #[test]
    fn test_explicit_ranges_need_full_coverage() {
        let params = FugueParams {
            ranges: Some(vec![(60, 84)]),
            ..FugueParams::default()
        };
        assert_eq!(params.voice_ranges(1), vec![(60, 84)]);
        // One range cannot cover three voices: fall back to defaults.
        assert_eq!(params.voice_ranges(3)[2], (57, 74));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params = FugueParams::from_json_str(
            r#"{ "n_voices": 4, "mode": "dorian", "weights": { "parallel": 9.0 } }"#,
        )
        .unwrap();
        assert_eq!(params.n_voices, 4);
        assert_eq!(params.mode, "dorian");
        assert_eq!(params.weights.parallel, 9.0);
        assert_eq!(params.weights.direct, 2.5);
        assert!(params.use_tonal_answer);
        assert_eq!(params.max_duration_beats, 150.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            FugueParams::from_json_str(r#"{ "tonic": 200 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FugueParams::from_json_str(r#"{ "ranges": [[60, 65]] }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FugueParams::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_generator_config_roundtrip() {
        let config = GeneratorConfig {
            seed: Some(7),
            ..GeneratorConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(GeneratorConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_sequencer_settings_reject_bad_tempo() {
        for json in [r#"{ "bpm": 0 }"#, r#"{ "bpm": -90.0 }"#] {
            assert!(matches!(
                SequencerSettings::from_json_str(json),
                Err(ConfigError::Invalid(_))
            ));
        }
        let settings = SequencerSettings::from_json_str(r#"{ "bpm": 96.0 }"#).unwrap();
        assert_eq!(settings.bpm, 96.0);
        assert_eq!(settings.voices, 3);

        let path = std::env::temp_dir().join(format!("fugue_seq_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "bpm": 0.0 }"#).unwrap();
        assert!(matches!(
            SequencerSettings::load(&path),
            Err(ConfigError::Invalid(_))
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_sequencer_settings_to_params() {
        let settings = SequencerSettings {
            voices: 7,
            density: 0.8,
            ..SequencerSettings::default()
        };
        let params = settings.to_params();
        assert_eq!(params.n_voices, 4);
        assert_eq!(params.entry_gap_beats, Some(2.0));
        assert!((params.stretto_overlap - 0.4).abs() < 1e-9);
        assert!((params.episode_density - 0.8).abs() < 1e-9);
    }
}
