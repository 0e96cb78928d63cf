// Fugue Music Generator: CLI entry point.
//
// Generates a subject, renders a fugue from it, reports the counterpoint cost,
// and writes the result to MIDI (optionally also a JSON dump of the score).
//
// Usage:
//   cargo run -p fugue_music --bin fugue -- [output.mid] [--voices N] [--tonic MIDI]
//     [--mode NAME] [--seed N] [--bars N] [--tempo BPM] [--stretto F]
//     [--tonal | --real] [--inversion] [--retrograde] [--config FILE.json]
//     [--json FILE] [--summary]
//
// Logging goes to stderr and honours RUST_LOG (default "info").

use fugue_music::config::GeneratorConfig;
use fugue_music::grid::{Grid, pitch_name};
use fugue_music::midi::write_midi;
use fugue_music::render::FugueEngine;
use fugue_music::scale::ScaleTable;
use fugue_music::scoring::score_counterpoint;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let output_path = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("fugue.mid");

    let mut config = match parse_flag::<String>(&args, "--config") {
        Some(path) => match GeneratorConfig::load(Path::new(&path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => GeneratorConfig::default(),
    };

    if let Some(v) = parse_flag(&args, "--voices") {
        config.params.n_voices = v;
    }
    if let Some(t) = parse_flag(&args, "--tonic") {
        config.params.tonic = t;
    }
    if let Some(m) = parse_flag(&args, "--mode") {
        config.params.mode = m;
    }
    if let Some(s) = parse_flag(&args, "--seed") {
        config.seed = Some(s);
    }
    if let Some(b) = parse_flag(&args, "--bars") {
        config.subject_bars = b;
    }
    if let Some(t) = parse_flag(&args, "--tempo") {
        config.bpm = t;
    }
    if let Some(s) = parse_flag(&args, "--stretto") {
        config.params.stretto_overlap = s;
    }
    if has_flag(&args, "--real") {
        config.params.use_tonal_answer = false;
    }
    if has_flag(&args, "--tonal") {
        config.params.use_tonal_answer = true;
    }
    if has_flag(&args, "--inversion") {
        config.params.allow_inversion = true;
    }
    if has_flag(&args, "--retrograde") {
        config.params.allow_retrograde = true;
    }

    if config.bpm <= 0.0 {
        eprintln!("Tempo must be positive");
        std::process::exit(1);
    }
    if let Err(e) = config.params.validate() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    let params = config.params.clone();
    let mapper = match ScaleTable::from_name(&params.mode, params.tonic as u8) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let seed = config.seed.unwrap_or_else(clock_seed);

    println!("=== Fugue Generator ===");
    println!("Output: {}", output_path);
    println!("Key: {} {}", pitch_name(params.tonic), mapper.scale.name());
    println!("Voices: {}", params.voice_count());
    println!("Tempo: {} BPM", config.bpm);
    println!(
        "Answer: {}",
        if params.use_tonal_answer { "tonal" } else { "real" }
    );
    println!("Seed: {}", seed);
    println!();

    let mut engine = FugueEngine::new(mapper, seed);

    println!("[1/4] Generating subject ({} bar(s))...", config.subject_bars);
    let subject = engine.generate_subject(&params, config.subject_bars);
    let names: Vec<String> = subject
        .iter()
        .map(|n| match n.pitch {
            Some(p) => format!("{}:{}", pitch_name(p), n.duration),
            None => format!("rest:{}", n.duration),
        })
        .collect();
    println!("  {}", names.join(" "));

    println!("[2/4] Rendering fugue...");
    let score = engine.render(&subject, &params);
    println!(
        "  {} voices, {} notes, {:.1} quarter notes",
        score.voice_count(),
        score.note_count(),
        score.horizon()
    );

    println!("[3/4] Scoring counterpoint...");
    let cost = score_counterpoint(score.voices(), &params);
    println!("  Parallel perfects: {:.2}", cost.parallel);
    println!("  Direct perfects:   {:.2}", cost.direct);
    println!("  Dissonances:       {:.2}", cost.dissonance);
    println!("  Crossings:         {:.0}", cost.crossing);
    println!("  Melodic motion:    {:.0}", cost.melodic_motion);
    println!("  Hard unisons:      {:.0}", cost.hard_unison);
    println!("  Total cost:        {:.1}", cost.total);

    if has_flag(&args, "--summary") {
        println!();
        print!("{}", Grid::from_voices(score.voices(), params.grid_resolution).summary());
        println!();
    }

    if let Some(json_path) = parse_flag::<String>(&args, "--json") {
        match score.write_json(Path::new(&json_path)) {
            Ok(()) => println!("  Score written to {}", json_path),
            Err(e) => {
                eprintln!("  Error writing JSON: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!("[4/4] Writing MIDI to {}...", output_path);
    match write_midi(&score, config.bpm, Path::new(output_path)) {
        Ok(()) => {
            let duration_seconds = score.horizon() * 60.0 / config.bpm;
            println!(
                "  Done! Duration: {:.0}s ({:.1} bars)",
                duration_seconds,
                score.horizon() / 4.0
            );
        }
        Err(e) => {
            eprintln!("  Error writing MIDI: {}", e);
            std::process::exit(1);
        }
    }

    println!();
    println!("Play with: timidity {} (or any MIDI player)", output_path);
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
