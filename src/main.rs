use clap::Parser;
use mmp2midi::{convert_file, ConvertOptions, DEFAULT_MIDI_TPQ};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "mmp2midi - converts mmp or mmpz file to midi file\n\
Usage: mmp2midi inputfile";

#[derive(Parser, Debug)]
#[command(name = "mmp2midi", version)]
#[command(about = "Converts mmp or mmpz file to midi file", long_about = None)]
struct Args {
    /// LMMS project (.mmp, or compressed .mmpz)
    input: Option<PathBuf>,

    /// Output file path (default: input with its extension replaced by .mid)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// MIDI resolution of the written file
    #[arg(long, default_value_t = DEFAULT_MIDI_TPQ, value_parser = clap::value_parser!(u16).range(1..=32767))]
    ticks_per_beat: u16,

    /// Suppress informational messages (only errors)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log skipped notes and project details
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let Some(input) = args.input else {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    };

    let level = if args.quiet {
        "error"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let options = ConvertOptions {
        output: args.output,
        ticks_per_beat: args.ticks_per_beat,
    };

    match convert_file(&input, &options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mmp2midi: {}: {}", input.display(), e);
            ExitCode::FAILURE
        }
    }
}
