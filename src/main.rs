use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use midi_cc_timeline::{
    ExtractConfig, config::DEFAULT_CONTROLLER, extract, report::Report, tempo::DEFAULT_TEMPO,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "List timestamped Control Change events in MIDI files")]
struct Opt {
    /// Standard MIDI Files to scan
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Controller number to report
    #[arg(short, long, default_value_t = DEFAULT_CONTROLLER,
          value_parser = clap::value_parser!(u8).range(0..=127))]
    controller: u8,

    /// Track whose tempo events drive the timeline
    #[arg(short, long = "tempo-track", default_value_t = 0)]
    tempo_track: usize,

    /// Tempo (µs per quarter note) before the first tempo event
    #[arg(long, default_value_t = DEFAULT_TEMPO,
          value_parser = clap::value_parser!(u32).range(1..))]
    default_tempo: u32,
}

impl Opt {
    fn config(&self) -> ExtractConfig {
        ExtractConfig {
            controller: self.controller,
            tempo_source_track: self.tempo_track,
            default_tempo: self.default_tempo,
        }
    }
}

fn process_file(path: &Path, config: &ExtractConfig) -> Result<String> {
    if !path.is_file() {
        bail!("MIDI file not found at {}", path.display());
    }
    let bytes = fs::read(path).with_context(|| format!("reading {:?}", path))?;
    log::info!("{}: {} bytes", path.display(), bytes.len());

    let extraction =
        extract(&bytes, config).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Report::new(&extraction, config).to_string())
}

/// One stderr line per failed file, with the whole context chain.
fn failure_message(err: &anyhow::Error) -> String {
    format!("Error: {err:#}")
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let opt = Opt::parse();
    let config = opt.config();

    println!("MIDI CC{} Parser", config.controller);
    println!("================");

    let mut failed = 0usize;
    for path in &opt.files {
        println!("Parsing MIDI file: {}", path.display());
        match process_file(path, &config) {
            Ok(report) => print!("{report}"),
            Err(e) => {
                eprintln!("{}", failure_message(&e));
                failed += 1;
            }
        }
        println!();
    }

    if failed > 0 {
        eprintln!("{failed} of {} files failed", opt.files.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
