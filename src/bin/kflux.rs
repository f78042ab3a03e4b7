//! kflux - Command-line interface for Keystroke Flux
//!
//! Commands:
//! - extract: Aggregate one or more keystroke logs into a grapheme feature table
//! - inspect: Print the user header and per-session summary of a log
//! - graphemes: Print one session's grapheme map

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use keystroke_flux::config::{
    FlightCorrection, FluxConfig, GapLayout, GapWindow, GraphemeEncoding, LengthPolicy, TimeUnit,
    TimingSource,
};
use keystroke_flux::pipeline::{BatchProcessor, UNKNOWN_USER};
use keystroke_flux::reader::{KeystrokeLog, LogReader};
use keystroke_flux::{FluxError, FLUX_VERSION, PRODUCER_NAME};

/// kflux - Keystroke-dynamics feature extraction
#[derive(Parser)]
#[command(name = "kflux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Turn keystroke timing logs into grapheme feature tables", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate keystroke logs into a CSV (or JSON) feature table
    Extract {
        /// Input log files
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "csv")]
        format: OutputFormat,

        /// Label for rows whose log has no user name
        #[arg(long, default_value = UNKNOWN_USER)]
        user_label: String,

        /// Load resumable dictionary state before processing
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save dictionary state after processing
        #[arg(long)]
        save_state: Option<PathBuf>,

        #[command(flatten)]
        options: PipelineArgs,
    },

    /// Print user info and per-session summary of a log
    Inspect {
        /// Input log file
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        options: PipelineArgs,
    },

    /// Print one session's grapheme map
    Graphemes {
        /// Input log file
        #[arg(short, long)]
        input: PathBuf,

        /// Session number (1-based)
        #[arg(long, default_value = "1")]
        session: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        options: PipelineArgs,
    },
}

/// Options shared by every command that decodes logs
#[derive(clap::Args)]
struct PipelineArgs {
    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grapheme order (2 = digraphs, 3 = trigraphs)
    #[arg(long)]
    order: Option<usize>,

    /// Layout of the time-delta and flight-time arrays
    #[arg(long)]
    gap_layout: Option<GapLayoutArg>,

    /// Window over the gap arrays when building graphemes
    #[arg(long)]
    gap_window: Option<GapWindowArg>,

    /// Reject logs whose arrays disagree with the gap layout (strict) or let
    /// misaligned sessions be skipped later (lenient)
    #[arg(long)]
    length_policy: Option<LengthPolicyArg>,

    /// Recompute timings from keystroke timestamps
    #[arg(long)]
    derive_timings: bool,

    /// Fold flight times above this threshold as wrapped negatives
    #[arg(long, num_args = 0..=1, default_missing_value = "500000")]
    flight_correction: Option<u64>,

    /// Grapheme label encoding
    #[arg(long)]
    encoding: Option<EncodingArg>,

    /// Unit of emitted timing statistics
    #[arg(long)]
    time_unit: Option<TimeUnitArg>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Fully quoted CSV
    Csv,
    /// Feature table as JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum GapLayoutArg {
    /// n - 1 entries per session
    BetweenKeys,
    /// n entries per session
    PerKey,
}

#[derive(Clone, Copy, ValueEnum)]
enum GapWindowArg {
    /// Same window as the grapheme order
    Grapheme,
    /// Grapheme order minus one
    Transitions,
}

#[derive(Clone, Copy, ValueEnum)]
enum LengthPolicyArg {
    Strict,
    Lenient,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    /// Key characters
    Raw,
    /// Decimal key codes
    Codepoint,
}

#[derive(Clone, Copy, ValueEnum)]
enum TimeUnitArg {
    Ns,
    Ms,
}

impl PipelineArgs {
    fn resolve(&self) -> Result<FluxConfig, FluxCliError> {
        let mut config = match &self.config {
            Some(path) => FluxConfig::from_file(path)?,
            None => FluxConfig::default(),
        };

        if let Some(order) = self.order {
            config.grapheme_order = order;
        }
        if let Some(layout) = self.gap_layout {
            config.gap_layout = match layout {
                GapLayoutArg::BetweenKeys => GapLayout::BetweenKeys,
                GapLayoutArg::PerKey => GapLayout::PerKey,
            };
        }
        if let Some(window) = self.gap_window {
            config.gap_window = match window {
                GapWindowArg::Grapheme => GapWindow::Grapheme,
                GapWindowArg::Transitions => GapWindow::Transitions,
            };
        }
        if let Some(policy) = self.length_policy {
            config.length_policy = match policy {
                LengthPolicyArg::Strict => LengthPolicy::Strict,
                LengthPolicyArg::Lenient => LengthPolicy::Lenient,
            };
        }
        if self.derive_timings {
            config.timing_source = TimingSource::Derived;
        }
        if let Some(threshold) = self.flight_correction {
            config.flight_correction = Some(FlightCorrection { threshold });
        }
        if let Some(encoding) = self.encoding {
            config.grapheme_encoding = match encoding {
                EncodingArg::Raw => GraphemeEncoding::Raw,
                EncodingArg::Codepoint => GraphemeEncoding::Codepoint,
            };
        }
        if let Some(unit) = self.time_unit {
            config.time_unit = match unit {
                TimeUnitArg::Ns => TimeUnit::Nanoseconds,
                TimeUnitArg::Ms => TimeUnit::Milliseconds,
            };
        }

        config.validate()?;
        tracing::debug!(?config, "resolved configuration");
        Ok(config)
    }
}

/// Initialize tracing subscriber; warnings always reach stderr
fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FluxCliError> {
    match cli.command {
        Commands::Extract {
            input,
            output,
            format,
            user_label,
            load_state,
            save_state,
            options,
        } => cmd_extract(
            &input,
            &output,
            format,
            &user_label,
            load_state.as_deref(),
            save_state.as_deref(),
            &options,
        ),
        Commands::Inspect {
            input,
            json,
            options,
        } => cmd_inspect(&input, json, &options),
        Commands::Graphemes {
            input,
            session,
            json,
            options,
        } => cmd_graphemes(&input, session, json, &options),
    }
}

fn cmd_extract(
    input: &[PathBuf],
    output: &Path,
    format: OutputFormat,
    user_label: &str,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
    options: &PipelineArgs,
) -> Result<(), FluxCliError> {
    let mut processor = BatchProcessor::with_config(options.resolve()?)?;

    if let Some(state_path) = load_state {
        let state_json = fs::read_to_string(state_path)?;
        processor.load_state(&state_json)?;
    }

    let summary = processor.process_files(input).clone();
    tracing::info!(
        files = summary.files_processed,
        failed = summary.files_failed,
        sessions = summary.sessions_aggregated,
        skipped = summary.sessions_skipped,
        "batch complete"
    );

    if processor.dictionary().row_count() == 0 {
        return Err(FluxCliError::NoSessions);
    }

    if let Some(state_path) = save_state {
        fs::write(state_path, processor.save_state()?)?;
    }

    let rendered = match format {
        OutputFormat::Csv => processor.dictionary().to_csv_string(user_label)?,
        OutputFormat::Json => {
            let table = processor.dictionary().feature_table(user_label);
            format!("{}\n", serde_json::to_string(&table)?)
        }
    };

    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        stdout.write_all(rendered.as_bytes())?;
        stdout.flush()?;
    } else {
        fs::write(output, rendered)?;
    }

    Ok(())
}

fn read_log(input: &Path, options: &PipelineArgs) -> Result<(FluxConfig, KeystrokeLog), FluxCliError> {
    let config = options.resolve()?;
    let log = LogReader::new(config.reader()).read_file(input)?;
    Ok((config, log))
}

fn cmd_inspect(input: &Path, json: bool, options: &PipelineArgs) -> Result<(), FluxCliError> {
    let (_, log) = read_log(input, options)?;

    let sessions: Vec<SessionSummary> = log
        .sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let span = s.time_span();
            SessionSummary {
                session: i + 1,
                keystrokes: s.keystrokes.len(),
                time_deltas: s.time_deltas.len(),
                dwell_times: s.dwell_times.len(),
                flight_times: s.flight_times.len(),
                started_at: span.map(|(start, _)| start.to_rfc3339()),
                ended_at: span.map(|(_, end)| end.to_rfc3339()),
                text: s.text(),
            }
        })
        .collect();

    let report = InspectReport {
        producer: PRODUCER_NAME.to_string(),
        user: log.user.user.clone(),
        email: log.user.email.clone(),
        major: log.user.major.clone(),
        typing_duration_seconds: log.user.typing_duration_seconds,
        sessions,
    };

    if json {
        print_json(&report)?;
    } else {
        println!("User:     {}", report.user);
        println!("Email:    {}", report.email);
        println!("Major:    {}", report.major);
        println!("Duration: {}s", report.typing_duration_seconds);
        println!("Sessions: {}", report.sessions.len());
        for s in &report.sessions {
            println!(
                "  #{:<3} keys={:<5} deltas={:<5} dwells={:<5} flights={:<5} {}",
                s.session,
                s.keystrokes,
                s.time_deltas,
                s.dwell_times,
                s.flight_times,
                s.started_at.as_deref().unwrap_or("-"),
            );
        }
    }

    Ok(())
}

fn cmd_graphemes(input: &Path, session: usize, json: bool, options: &PipelineArgs) -> Result<(), FluxCliError> {
    let (config, log) = read_log(input, options)?;
    let selected = session
        .checked_sub(1)
        .and_then(|i| log.sessions.get(i))
        .ok_or(FluxCliError::NoSuchSession(session, log.sessions.len()))?;

    let processor = BatchProcessor::with_config(config)?;
    let map = processor.grapheme_map(selected)?;

    if json {
        print_json(&map)?;
    } else {
        println!("{:>5}  {:<10} {:>14} {:>14} {:>14}", "#", "grapheme", "time_delta", "dwell_time", "flight_time");
        for row in map.rows() {
            println!(
                "{:>5}  {:<10} {:>14.3} {:>14.3} {:>14.3}",
                row.index,
                format!("{:?}", row.grapheme),
                row.time_delta,
                row.dwell_time,
                row.flight_time
            );
        }
    }

    Ok(())
}

/// Pretty JSON for terminals, compact JSON for pipes
fn print_json<T: serde::Serialize>(value: &T) -> Result<(), FluxCliError> {
    let rendered = if atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}

// Error types

#[derive(Debug)]
enum FluxCliError {
    Io(io::Error),
    Flux(FluxError),
    Json(serde_json::Error),
    NoSessions,
    NoSuchSession(usize, usize),
}

impl From<io::Error> for FluxCliError {
    fn from(e: io::Error) -> Self {
        FluxCliError::Io(e)
    }
}

impl From<FluxError> for FluxCliError {
    fn from(e: FluxError) -> Self {
        FluxCliError::Flux(e)
    }
}

impl From<serde_json::Error> for FluxCliError {
    fn from(e: serde_json::Error) -> Self {
        FluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FluxCliError> for CliError {
    fn from(e: FluxCliError) -> Self {
        match e {
            FluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FluxCliError::Flux(e) => {
                let hint = match &e {
                    FluxError::TruncatedInput { .. } => {
                        Some("The log is incomplete or not a keystroke log".to_string())
                    }
                    FluxError::ArrayLengthMismatch { .. } => Some(
                        "Try --gap-layout per-key, --length-policy lenient or --derive-timings".to_string(),
                    ),
                    FluxError::ColumnLengthMismatch { .. } => {
                        Some("Between-key gap arrays need --gap-window transitions".to_string())
                    }
                    FluxError::UnsupportedGraphemeOrder(_) => Some("Use --order 2 or --order 3".to_string()),
                    _ => None,
                };
                CliError {
                    code: "FLUX_ERROR".to_string(),
                    message: e.to_string(),
                    hint,
                }
            }
            FluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FluxCliError::NoSessions => CliError {
                code: "NO_SESSIONS".to_string(),
                message: "No session could be aggregated".to_string(),
                hint: Some(
                    "Run with --verbose to see why each session was skipped; recorder logs need --gap-window transitions"
                        .to_string(),
                ),
            },
            FluxCliError::NoSuchSession(requested, available) => CliError {
                code: "NO_SUCH_SESSION".to_string(),
                message: format!("Session {} requested, log has {}", requested, available),
                hint: Some("Sessions are numbered from 1".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct InspectReport {
    producer: String,
    user: String,
    email: String,
    major: String,
    typing_duration_seconds: i16,
    sessions: Vec<SessionSummary>,
}

#[derive(serde::Serialize)]
struct SessionSummary {
    session: usize,
    keystrokes: usize,
    time_deltas: usize,
    dwell_times: usize,
    flight_times: usize,
    started_at: Option<String>,
    ended_at: Option<String>,
    text: String,
}
