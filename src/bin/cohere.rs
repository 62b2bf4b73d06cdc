//! Cohere CLI - Command-line interface for the coherence engine
//!
//! Commands:
//! - ingest: Load an ECG upload (CSV/JSON) and print the batch summary
//! - events: Ingest a file and dump its events for a time window
//! - score: Score a single breath-rate/HRV pair
//! - replay: Replay a JSON array of check-ins through the engine

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use coherence_engine::pipeline::CoherenceEngine;
use coherence_engine::scoring;
use coherence_engine::types::CheckIn;
use coherence_engine::{EngineError, UploadFormat, ENGINE_VERSION};

/// Cohere - biometric signal normalization and coherence scoring
#[derive(Parser)]
#[command(name = "cohere")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Normalize biometric uploads and score check-ins", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest an ECG upload and print the batch summary
    Ingest {
        /// Input file path (use - for stdin; format inferred from extension
        /// unless --format is given)
        #[arg(short, long)]
        input: PathBuf,

        /// Upload format (csv or json); required when reading stdin
        #[arg(long)]
        format: Option<String>,

        /// IANA timezone for naive timestamps (e.g. "America/New_York")
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Ingest a file and dump its normalized events for a time window
    Events {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Upload format (csv or json)
        #[arg(long)]
        format: Option<String>,

        /// Window start (inclusive, RFC 3339)
        #[arg(long)]
        since: DateTime<Utc>,

        /// Window end (exclusive, RFC 3339)
        #[arg(long)]
        until: DateTime<Utc>,

        /// IANA timezone for naive timestamps
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Score a single breath-rate/HRV pair
    Score {
        /// Breath rate (breaths per minute)
        #[arg(long)]
        breath_rate: f64,

        /// Heart-rate variability (ms)
        #[arg(long)]
        hrv: f64,
    },

    /// Replay a JSON array of check-ins through the engine
    Replay {
        /// Input file with a JSON array of check-in records
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CohereCliError> {
    match cli.command {
        Commands::Ingest {
            input,
            format,
            timezone,
        } => cmd_ingest(&input, format.as_deref(), timezone.as_deref()),

        Commands::Events {
            input,
            format,
            since,
            until,
            timezone,
        } => cmd_events(&input, format.as_deref(), since, until, timezone.as_deref()),

        Commands::Score { breath_rate, hrv } => cmd_score(breath_rate, hrv),

        Commands::Replay { input } => cmd_replay(&input),
    }
}

fn cmd_ingest(
    input: &PathBuf,
    format: Option<&str>,
    timezone: Option<&str>,
) -> Result<(), CohereCliError> {
    let (content, format) = read_upload(input, format)?;

    let mut engine = CoherenceEngine::new();
    let summary = engine.ingest(&content, format, timezone)?;
    print_json(&summary)?;
    Ok(())
}

fn cmd_events(
    input: &PathBuf,
    format: Option<&str>,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    timezone: Option<&str>,
) -> Result<(), CohereCliError> {
    let (content, format) = read_upload(input, format)?;

    let mut engine = CoherenceEngine::new();
    engine.ingest(&content, format, timezone)?;
    let events = engine.events_between(since, until);

    print_json(&serde_json::json!({
        "since": since.to_rfc3339(),
        "until": until.to_rfc3339(),
        "count": events.len(),
        "events": events,
    }))?;
    Ok(())
}

fn cmd_score(breath_rate: f64, hrv: f64) -> Result<(), CohereCliError> {
    scoring::validate_vitals(breath_rate, hrv)?;
    let score = scoring::coherence_score(breath_rate, hrv);
    print_json(&serde_json::json!({ "coherence_score": score }))?;
    Ok(())
}

fn cmd_replay(input: &PathBuf) -> Result<(), CohereCliError> {
    let content = fs::read_to_string(input)?;
    let checkins: Vec<CheckIn> = serde_json::from_str(&content)?;

    let engine = CoherenceEngine::new();
    for checkin in checkins {
        let user_id = checkin.user_id.clone();
        let outcome = engine.check_in(checkin)?;
        print_json(&serde_json::json!({
            "user_id": user_id,
            "coherence_score": outcome.coherence_score,
            "trend": outcome.trend,
        }))?;
    }
    Ok(())
}

fn read_upload(
    input: &PathBuf,
    format: Option<&str>,
) -> Result<(Vec<u8>, UploadFormat), CohereCliError> {
    let content = if input.to_string_lossy() == "-" {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        buffer
    } else {
        fs::read(input)?
    };

    let format = match format {
        Some("csv") => UploadFormat::Csv,
        Some("json") => UploadFormat::Json,
        Some(other) => return Err(EngineError::UnsupportedFormat(other.to_string()).into()),
        None => UploadFormat::infer(&input.to_string_lossy())?,
    };

    Ok((content, format))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CohereCliError> {
    let rendered = if atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

// Error types

#[derive(Debug)]
enum CohereCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
}

impl From<io::Error> for CohereCliError {
    fn from(e: io::Error) -> Self {
        CohereCliError::Io(e)
    }
}

impl From<EngineError> for CohereCliError {
    fn from(e: EngineError) -> Self {
        CohereCliError::Engine(e)
    }
}

impl From<serde_json::Error> for CohereCliError {
    fn from(e: serde_json::Error) -> Self {
        CohereCliError::Json(e)
    }
}

impl std::fmt::Display for CohereCliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CohereCliError::Io(e) => write!(f, "{e}"),
            CohereCliError::Engine(e) => write!(f, "{e}"),
            CohereCliError::Json(e) => write!(f, "{e}"),
        }
    }
}
