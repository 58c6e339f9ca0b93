//! Viewtime CLI - Command-line interface for the view metrics engine
//!
//! Commands:
//! - replay: Replay recorded view events into metrics reports (batch mode)
//! - run: Process streaming NDJSON events from stdin (streaming mode)
//! - validate: Validate view event schema
//! - reasons: Print the no-value reason taxonomy

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use viewtime::schema::{parse_array, parse_events, parse_ndjson, validate_events, ViewEvent, SCHEMA_VERSION};
use viewtime::{
    InvNoValueReason, MetricsConfig, MetricsError, TnsNoValueReason, ViewMetricsProcessor,
    ViewMetricsReport, VIEWTIME_VERSION,
};

/// Viewtime - view-timing metrics from recorded client events
#[derive(Parser)]
#[command(name = "viewtime")]
#[command(version = VIEWTIME_VERSION)]
#[command(about = "Compute TNS, INV and legacy view metrics from view events", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded events into metrics reports (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format (detected from the first character when omitted)
        #[arg(long)]
        input_format: Option<InputFormat>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Metrics configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Process streaming NDJSON events from stdin (streaming mode)
    Run {
        /// Metrics configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Flush output after each report (`--flush false` to buffer)
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        flush: bool,
    },

    /// Validate view event schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format (detected from the first character when omitted)
        #[arg(long)]
        input_format: Option<InputFormat>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the reasons a metric can be missing
    Reasons {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one report per line)
    Ndjson,
    /// JSON array of reports
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

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

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), ViewtimeCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
        } => cmd_replay(&input, &output, input_format, output_format, config.as_deref()),

        Commands::Run { config, flush } => cmd_run(config.as_deref(), flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Reasons { json } => cmd_reasons(json),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: Option<InputFormat>,
    output_format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), ViewtimeCliError> {
    let config = load_config(config)?;
    let events = read_events(input, input_format.as_ref())?;

    if events.is_empty() {
        return Err(ViewtimeCliError::NoEvents);
    }
    validate_events(&events)?;

    let mut processor = ViewMetricsProcessor::with_config(config)?;
    let reports = processor.process_all(events);
    info!(reports = reports.len(), live_views = processor.live_view_count(), "replay finished");

    let output_data = format_output(&reports, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(config: Option<&Path>, flush: bool) -> Result<(), ViewtimeCliError> {
    let config = load_config(config)?;
    let mut processor = ViewMetricsProcessor::with_config(config)?;

    if atty::is(atty::Stream::Stdin) {
        warn!("reading events from an interactive terminal, one JSON event per line");
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let event: ViewEvent = serde_json::from_str(trimmed)
            .map_err(|e| ViewtimeCliError::ParseError(format!("Failed to parse event: {}", e)))?;
        event.validate()?;

        if let Some(report) = processor.process(event) {
            writeln!(stdout, "{}", report.to_json()?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    stdout.flush()?;
    Ok(())
}

fn cmd_validate(input: &Path, input_format: Option<InputFormat>, json: bool) -> Result<(), ViewtimeCliError> {
    let events = read_events(input, input_format.as_ref())?;

    let errors: Vec<ValidationErrorDetail> = events
        .iter()
        .enumerate()
        .filter_map(|(index, event)| {
            event.validate().err().map(|e| ValidationErrorDetail {
                index,
                kind: event.kind().to_string(),
                error: e.to_string(),
            })
        })
        .collect();

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_events: events.len(),
        valid_events: events.len() - errors.len(),
        invalid_events: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Schema:         {}", report.schema_version);
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} event (index {}): {}", err.kind, err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(ViewtimeCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_reasons(json: bool) -> Result<(), ViewtimeCliError> {
    let taxonomy = ReasonTaxonomy {
        tns: TnsNoValueReason::ALL
            .iter()
            .map(|reason| ReasonEntry {
                tag: reason.as_str(),
                description: reason.to_string(),
            })
            .collect(),
        inv: InvNoValueReason::ALL
            .iter()
            .map(|reason| ReasonEntry {
                tag: reason.as_str(),
                description: reason.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&taxonomy)?);
        return Ok(());
    }

    for (metric, entries) in [("TNS", &taxonomy.tns), ("INV", &taxonomy.inv)] {
        println!("{metric} no-value reasons");
        println!("{}", "=".repeat(metric.len() + 17));
        for entry in entries {
            println!("  {:<30} {}", entry.tag, entry.description);
        }
        println!();
    }
    Ok(())
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<MetricsConfig, ViewtimeCliError> {
    match path {
        Some(path) => Ok(MetricsConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(MetricsConfig::default()),
    }
}

fn read_events(input: &Path, input_format: Option<&InputFormat>) -> Result<Vec<ViewEvent>, ViewtimeCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let events = match input_format {
        Some(InputFormat::Ndjson) => parse_ndjson(&input_data)?,
        Some(InputFormat::Json) => parse_array(&input_data)?,
        None => parse_events(&input_data)?,
    };
    Ok(events)
}

fn format_output(reports: &[ViewMetricsReport], format: &OutputFormat) -> Result<String, ViewtimeCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for report in reports {
                lines.push(serde_json::to_string(report)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(reports)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(reports)?),
    }
}

// Error types

#[derive(Debug)]
enum ViewtimeCliError {
    Io(io::Error),
    Metrics(MetricsError),
    Json(serde_json::Error),
    Validation(viewtime::schema::EventValidationError),
    NoEvents,
    ValidationFailed(usize),
    ParseError(String),
}

impl From<io::Error> for ViewtimeCliError {
    fn from(e: io::Error) -> Self {
        ViewtimeCliError::Io(e)
    }
}

impl From<MetricsError> for ViewtimeCliError {
    fn from(e: MetricsError) -> Self {
        ViewtimeCliError::Metrics(e)
    }
}

impl From<serde_json::Error> for ViewtimeCliError {
    fn from(e: serde_json::Error) -> Self {
        ViewtimeCliError::Json(e)
    }
}

impl From<viewtime::schema::EventValidationError> for ViewtimeCliError {
    fn from(e: viewtime::schema::EventValidationError) -> Self {
        ViewtimeCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ViewtimeCliError> for CliError {
    fn from(e: ViewtimeCliError) -> Self {
        match e {
            ViewtimeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ViewtimeCliError::Metrics(MetricsError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Thresholds must be non-negative numbers of seconds".to_string()),
            },
            ViewtimeCliError::Metrics(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches the {} schema", SCHEMA_VERSION)),
            },
            ViewtimeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ViewtimeCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'viewtime validate' for details".to_string()),
            },
            ViewtimeCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ViewtimeCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            ViewtimeCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    kind: String,
    error: String,
}

#[derive(serde::Serialize)]
struct ReasonTaxonomy {
    tns: Vec<ReasonEntry>,
    inv: Vec<ReasonEntry>,
}

#[derive(serde::Serialize)]
struct ReasonEntry {
    tag: &'static str,
    description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_run_flush_defaults_on_and_can_be_disabled() {
        assert!(matches!(parse(&["viewtime", "run"]), Commands::Run { flush: true, .. }));
        assert!(matches!(
            parse(&["viewtime", "run", "--flush", "false"]),
            Commands::Run { flush: false, .. }
        ));
        assert!(matches!(
            parse(&["viewtime", "run", "--flush", "true"]),
            Commands::Run { flush: true, .. }
        ));
    }

    #[test]
    fn test_input_format_is_detected_when_omitted() {
        assert!(matches!(
            parse(&["viewtime", "replay", "-i", "session.json"]),
            Commands::Replay { input_format: None, .. }
        ));

        let event = r#"{"type":"view_start","view_id":"6f1c1f7e-6b0e-4d7a-9a51-2b8e0d3c4a10","name":"Home","time":"2024-01-15T14:00:00Z"}"#;
        let path = std::env::temp_dir().join(format!("viewtime-{}.json", std::process::id()));
        fs::write(&path, format!("[{event}]")).unwrap();

        let detected = read_events(&path, None).unwrap();
        assert_eq!(detected.len(), 1);
        assert!(read_events(&path, Some(&InputFormat::Ndjson)).is_err());

        fs::write(&path, format!("{event}\n{event}")).unwrap();
        assert_eq!(read_events(&path, None).unwrap().len(), 2);

        fs::remove_file(&path).unwrap();
    }
}
