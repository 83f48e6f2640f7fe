//! agrilens: command-line front end for the crop health analyzer.
//!
//! Reads an image file, runs the analyzer, and prints the report as
//! JSON. Also lists the detectors a catalog provides and maintains a
//! validation ledger file from farmer feedback.
//!
//! # Usage
//!
//! ```text
//! agrilens analyze [OPTIONS] <IMAGE_PATH>
//! agrilens detectors
//! agrilens ledger record --file ledger.json <DETECTED> <ACTUAL> <CONFIDENCE>
//! agrilens ledger report --file ledger.json
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` (e.g. `RUST_LOG=agrilens_analyzer=debug`)
//! or pass `-v` for more detail.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use agrilens_analyzer::diagnostics::Clock;
use agrilens_analyzer::ledger::LabelCounts;
use agrilens_analyzer::{
    AnalysisContext, Analyzer, AnalyzerConfig, Catalog, GrowthStage, ValidationLedger,
    WeatherConditions,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Explainable crop health analysis from plot photographs.
#[derive(Parser)]
#[command(name = "agrilens", version)]
struct Cli {
    #[command(flatten)]
    setup: Setup,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Analyzer configuration sources.
#[derive(Args)]
struct Setup {
    /// Analyzer configuration JSON file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Full analyzer config as a JSON string. Takes precedence over
    /// `--config`.
    #[arg(long, global = true)]
    config_json: Option<String>,

    /// Catalog JSON file replacing the built-in catalog.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one image and print the report.
    Analyze(AnalyzeArgs),
    /// List the pests and diseases the catalog can detect.
    Detectors,
    /// Record feedback or report accuracy.
    #[command(subcommand)]
    Ledger(LedgerCommand),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Crop name, forwarded to identification services.
    #[arg(long)]
    crop: Option<String>,

    /// Growth stage reported by the farmer; used for predictions.
    #[arg(long)]
    growth_stage: Option<GrowthStage>,

    /// Air temperature in degrees Celsius.
    #[arg(long, allow_hyphen_values = true)]
    temperature: Option<f64>,

    /// Relative humidity in percent.
    #[arg(long)]
    humidity: Option<f64>,

    /// Rainfall over the last 24 hours in millimetres.
    #[arg(long)]
    rainfall: Option<f64>,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,

    /// Print per-stage timings to stderr.
    #[arg(long)]
    timings: bool,
}

#[derive(Subcommand)]
enum LedgerCommand {
    /// Record one piece of feedback.
    Record {
        /// Ledger JSON file; created if missing.
        #[arg(long)]
        file: PathBuf,
        /// Label the analyzer reported.
        detected: String,
        /// Label confirmed in the field.
        actual: String,
        /// Confidence the analyzer reported, `[0, 1]`.
        confidence: f64,
    },
    /// Print per-label and overall accuracy.
    Report {
        /// Ledger JSON file.
        #[arg(long)]
        file: PathBuf,
    },
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build the analyzer from CLI configuration sources.
fn analyzer_from_cli(setup: &Setup) -> Result<Analyzer, String> {
    let config: AnalyzerConfig = if let Some(ref json) = setup.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else if let Some(ref path) = setup.config {
        let text = read_text(path)?;
        serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing {}: {e}", path.display()))?
    } else {
        AnalyzerConfig::default()
    };

    let catalog = match setup.catalog {
        Some(ref path) => Catalog::from_json(&read_text(path)?),
        None => Catalog::builtin(),
    }
    .map_err(|e| e.to_string())?;

    Analyzer::new(config, catalog).map_err(|e| e.to_string())
}

fn read_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| format!("Error serializing output: {e}"))?;
    println!("{json}");
    Ok(())
}

fn run_analyze(analyzer: &Analyzer, args: &AnalyzeArgs) -> Result<(), String> {
    let image_bytes = std::fs::read(&args.image_path)
        .map_err(|e| format!("Error reading {}: {e}", args.image_path.display()))?;

    let weather = (args.temperature.is_some() || args.humidity.is_some() || args.rainfall.is_some())
        .then_some(WeatherConditions {
            temperature_c: args.temperature,
            relative_humidity: args.humidity,
            rainfall_mm: args.rainfall,
        });
    let context = AnalysisContext {
        weather,
        growth_stage_hint: args.growth_stage,
    };

    tracing::info!(
        image = %args.image_path.display(),
        bytes = image_bytes.len(),
        crop = args.crop.as_deref().unwrap_or("-"),
        "analyzing"
    );

    let (report, diagnostics) = analyzer
        .analyze_bytes_with_diagnostics(&image_bytes, args.crop.as_deref(), &context, &StdClock)
        .map_err(|e| format!("Analysis failed: {e}"))?;

    if args.timings {
        eprintln!("{}", diagnostics.report());
    }
    print_json(&report, args.pretty)
}

/// Load a ledger file; a missing file is an empty ledger.
fn load_ledger(path: &Path) -> Result<ValidationLedger, String> {
    if !path.exists() {
        return Ok(ValidationLedger::new());
    }
    let counts: BTreeMap<String, LabelCounts> = serde_json::from_str(&read_text(path)?)
        .map_err(|e| format!("Error parsing {}: {e}", path.display()))?;
    Ok(ValidationLedger::from_snapshot(counts))
}

fn save_ledger(path: &Path, ledger: &ValidationLedger) -> Result<(), String> {
    let json = serde_json::to_string_pretty(&ledger.snapshot())
        .map_err(|e| format!("Error serializing ledger: {e}"))?;
    std::fs::write(path, json).map_err(|e| format!("Error writing {}: {e}", path.display()))
}

fn run_ledger(command: &LedgerCommand) -> Result<(), String> {
    match command {
        LedgerCommand::Record {
            file,
            detected,
            actual,
            confidence,
        } => {
            let ledger = load_ledger(file)?;
            ledger.record(detected, actual, *confidence);
            save_ledger(file, &ledger)?;
            eprintln!("Recorded feedback in {}", file.display());
            Ok(())
        }
        LedgerCommand::Report { file } => print_json(&load_ledger(file)?.report(), true),
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    match cli.command {
        Command::Analyze(ref args) => run_analyze(&analyzer_from_cli(&cli.setup)?, args),
        Command::Detectors => {
            print_json(&analyzer_from_cli(&cli.setup)?.list_supported_detectors(), true)
        }
        Command::Ledger(ref command) => run_ledger(command),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
