// Fugue Music Generator
//
// A contrapuntal composition engine: from a short generated subject it builds
// a complete multi-voice fugue (exposition with answers and countersubject,
// episodes, re-entries in related keys, stretto, final statement, cadence),
// then repairs the counterpoint against a grid-based cost model. With one
// voice it writes a monophonic melody instead.
//
// Architecture:
// - note.rs: Notes, phrases, and the rendered `Score`
// - transform.rs: Transposition, inversion, retrograde, time scaling, slicing
// - scale.rs: Scale-degree to pitch mapping (`ScaleMapper` seam + `ScaleTable`)
// - config.rs: `FugueParams`, CLI and sequencer configuration (serde JSON)
// - error.rs: Mapping, configuration, and export errors
// - subject.rs: Subject generation, tonal/real answer, countersubject
// - plan.rs: Exposition entry planning
// - episode.rs: Episodes, complex three-part episode, stretto, cadence
// - grid.rs: Score quantization onto a fixed step grid + interval helpers
// - scoring.rs: Weighted counterpoint cost
// - optimize.rs: Greedy optimizer, unison polish, range folding
// - render.rs: `FugueEngine`, the orchestrator
// - playback.rs: Step-wise playback cursor over a rendered score
// - sequencer.rs: Back-to-back piece playback with injected time
// - midi.rs: MIDI file output
//
// The generator is deterministic given a seed, supporting reproducible output.

pub mod config;
pub mod episode;
pub mod error;
pub mod grid;
pub mod midi;
pub mod note;
pub mod optimize;
pub mod plan;
pub mod playback;
pub mod render;
pub mod scale;
pub mod scoring;
pub mod sequencer;
pub mod subject;
pub mod transform;
