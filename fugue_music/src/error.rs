// Error types for the fugue generator.
//
// `MappingError` never escapes a generator: every call site that asks the
// scale mapper for a pitch substitutes an arithmetic fallback and continues.
// `ConfigError` and `ExportError` are surfaced to the CLI and sequencer.

use thiserror::Error;

/// The scale mapper could not produce a MIDI pitch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("degree {degree} in octave {octave} maps to pitch {pitch}, outside 0..=127")]
    OutOfRange { degree: i32, octave: i32, pitch: i32 },

    #[error("scale has no degrees")]
    EmptyScale,
}

/// Configuration could not be loaded or is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown scale '{0}'")]
    UnknownScale(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A rendered score could not be written out.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}
