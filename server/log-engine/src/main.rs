//! Binary entrypoint: parse log files, write JSON lines to stdout.
//!
//! Each output line is either:
//! - An Entry tagged with its file (default)
//! - A per-line search document (`--lines`)
//! - An ErrorOutput (when a file cannot be read)
//!
//! Files are parsed concurrently, one thread per file; output keeps argument order.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::error;
use tracing_subscriber::EnvFilter;

use log_engine::types::ErrorOutput;
use log_engine::{dedup_by_message_hash, line_documents, read_log_file, Entry, LineDocument, LogParser};

#[derive(Parser, Debug)]
#[command(name = "log-engine")]
#[command(about = "Classify engine logs and group tracebacks into structured entries")]
struct Args {
  /// Emit one search document per physical line instead of entries
  #[arg(long)]
  lines: bool,

  /// Keep only the first entry per message hash
  #[arg(long)]
  dedup: bool,

  /// Log files to parse
  #[arg(required = true)]
  files: Vec<PathBuf>,
}

enum Parsed {
  Entries(Vec<Entry>),
  Lines(Vec<LineDocument>),
}

#[derive(Serialize)]
struct FileEntry<'a> {
  file: &'a str,
  #[serde(flatten)]
  entry: &'a Entry,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();
  match run(&args) {
    Ok(true) => {}
    Ok(false) => std::process::exit(1),
    Err(e) => {
      error!(error = %e, "log-engine failed");
      std::process::exit(1);
    }
  }
}

/// Returns `Ok(false)` when at least one file could not be parsed.
fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
  let parser = LogParser::with_defaults();
  let indexed_at = Utc::now();

  let results: Vec<_> = thread::scope(|scope| {
    let handles: Vec<_> = args
      .files
      .iter()
      .map(|path| {
        let parser = &parser;
        scope.spawn(move || parse_one(parser, path, args.lines, indexed_at))
      })
      .collect();
    handles
      .into_iter()
      .map(|handle| match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
      })
      .collect()
  });

  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());
  let mut all_ok = true;

  for (path, result) in args.files.iter().zip(results) {
    let file = path.to_string_lossy();
    match result {
      Ok(Parsed::Entries(entries)) => {
        let entries = if args.dedup {
          dedup_by_message_hash(entries)
        } else {
          entries
        };
        for entry in &entries {
          serde_json::to_writer(&mut out, &FileEntry { file: &file, entry })?;
          writeln!(out)?;
        }
      }
      Ok(Parsed::Lines(docs)) => {
        for doc in &docs {
          serde_json::to_writer(&mut out, doc)?;
          writeln!(out)?;
        }
      }
      Err(e) => {
        all_ok = false;
        error!(file = %path.display(), error = %e, "cannot parse log file");
        let err = ErrorOutput::new(e.to_string()).with_file(file.to_string());
        serde_json::to_writer(&mut out, &err)?;
        writeln!(out)?;
      }
    }
  }

  out.flush()?;
  Ok(all_ok)
}

fn parse_one(
  parser: &LogParser,
  path: &Path,
  lines: bool,
  indexed_at: DateTime<Utc>,
) -> Result<Parsed, log_engine::EngineError> {
  let contents = read_log_file(path)?;
  let filename = path.to_string_lossy();
  if lines {
    Ok(Parsed::Lines(line_documents(&contents, &filename, indexed_at)))
  } else {
    Ok(Parsed::Entries(parser.parse_str(&contents, &filename)))
  }
}
