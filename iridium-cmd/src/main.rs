use std::fs::File;
use std::io::{self, stderr, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use iridium::{Decoder, Record};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
enum Format {
    Text,
    Json,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Text, Self::Json]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
        }
    }
}

/// Decode captured Iridium paging bursts into readable records.
///
/// Reads RAW capture lines, one burst per line, and prints the deepest
/// protocol layer each burst decodes to. Lines that do not match the capture
/// schema are skipped with a warning.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Log decoder detail to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Input line format; only raw capture lines are supported
    #[arg(short, long, default_value = "raw", value_name = "format")]
    input: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: Format,

    /// Number of decode threads
    #[arg(short = 'j', long, value_name = "num")]
    threads: Option<usize>,

    /// Input capture files; read stdin when none are given
    inputs: Vec<PathBuf>,
}

fn read_lines(paths: &[PathBuf]) -> Result<Box<dyn Iterator<Item = String> + Send>> {
    if paths.is_empty() {
        let reader = BufReader::new(io::stdin());
        return Ok(Box::new(reader.lines().map_while(io::Result::ok)));
    }
    let mut readers = Vec::with_capacity(paths.len());
    for path in paths {
        let file = File::open(path).with_context(|| format!("opening input {path:?}"))?;
        readers.push(BufReader::new(file));
    }
    Ok(Box::new(
        readers
            .into_iter()
            .flat_map(|reader| reader.lines().map_while(io::Result::ok)),
    ))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("IRIDIUM_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if cli.input != "raw" {
        bail!("unsupported input format: {}", cli.input);
    }

    let lines = read_lines(&cli.inputs)?;
    let mut decoder = Decoder::new();
    if let Some(num) = cli.threads {
        decoder = decoder.with_threads(num);
    }

    for zult in decoder.decode(lines) {
        match zult {
            Ok(record) => emit(&record, &cli.format)?,
            Err(err) => warn!("skipping line: {err}"),
        }
    }
    Ok(())
}

fn emit(record: &Record, format: &Format) -> Result<()> {
    match format {
        Format::Text => println!("{record}"),
        Format::Json => println!("{}", serde_json::to_string(record)?),
    }
    Ok(())
}
