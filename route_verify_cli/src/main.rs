use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use rayon::prelude::*;
use route_verify::{
    compare_tracks, parse_track, render_report, ReportOptions, Track, VerifyConfig, VerifyError,
    EXIT_EQUAL, EXIT_FAILURE, EXIT_NOT_EQUAL,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Check whether two GPS tracks describe the same route", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare two GPX/GeoJSON tracks and print a pass/fail report
    Compare(CompareArgs),
    /// Compare every pair listed in a CSV manifest (columns `a,b`)
    Batch(BatchArgs),
}

impl Command {
    fn verbose(&self) -> bool {
        match self {
            Command::Compare(args) => args.verbose,
            Command::Batch(args) => args.verbose,
        }
    }
}

#[derive(Args, Debug, Default)]
struct ToleranceArgs {
    /// Corridor half-width around each track in meters [default: 1]
    #[arg(short, long)]
    buffer: Option<f64>,

    /// Altitude resampling interval in meters [default: 100]
    #[arg(long)]
    altitude_interval: Option<f64>,

    /// Maximum elevation difference in meters [default: buffer distance]
    #[arg(long)]
    altitude_tolerance: Option<f64>,

    /// Grid step for the altitude comparison in meters [default: 100]
    #[arg(long)]
    comparison_step: Option<f64>,

    /// JSON file with default tolerances (flags take precedence)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
}

impl ToleranceArgs {
    fn resolve(&self) -> Result<VerifyConfig> {
        let mut config = match self.config.as_ref() {
            Some(path) => load_config(path)?,
            None => VerifyConfig::default(),
        };
        if let Some(buffer) = self.buffer {
            config.buffer_m = buffer;
        }
        if let Some(interval) = self.altitude_interval {
            config.altitude_interval_m = interval;
        }
        if let Some(tolerance) = self.altitude_tolerance {
            config.altitude_tolerance_m = Some(tolerance);
        }
        if let Some(step) = self.comparison_step {
            config.comparison_step_m = step;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Parser, Debug)]
struct CompareArgs {
    /// First track (GPX or GeoJSON)
    #[arg(value_hint = ValueHint::FilePath)]
    first: PathBuf,

    /// Second track (GPX or GeoJSON)
    #[arg(value_hint = ValueHint::FilePath)]
    second: PathBuf,

    #[command(flatten)]
    tolerances: ToleranceArgs,

    /// Print the result as JSON instead of the text report
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Verbose logging and altitude difference table
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Rows of the altitude table shown with --verbose
    #[arg(long, default_value_t = 10)]
    table_rows: usize,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// CSV manifest with `a,b` columns; relative paths resolve against its directory
    #[arg(value_hint = ValueHint::FilePath)]
    manifest: PathBuf,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    #[command(flatten)]
    tolerances: ToleranceArgs,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct PairRow {
    a: PathBuf,
    b: PathBuf,
}

#[derive(Debug, Serialize, PartialEq)]
struct PairOutcome {
    a: String,
    b: String,
    geometry_equal: Option<bool>,
    altitude_within_tolerance: Option<bool>,
    max_diff_m: Option<f64>,
    avg_diff_m: Option<f64>,
    overall_equal: bool,
    exit_code: u8,
    error: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.command.verbose() { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let outcome = match cli.command {
        Command::Compare(args) => handle_compare(args),
        Command::Batch(args) => handle_batch(args),
    };
    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(failure_code(&err))
        }
    }
}

/// Exit code for a failed run: the first `VerifyError` in the chain decides.
fn failure_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<VerifyError>())
        .map(VerifyError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

fn handle_compare(args: CompareArgs) -> Result<u8> {
    let config = args.tolerances.resolve()?;
    debug!("Effective configuration: {:?}", config);

    let a = load_track(&args.first)?;
    let b = load_track(&args.second)?;

    let t_compare = Instant::now();
    let result = compare_tracks(&a, &b, &config).with_context(|| {
        format!(
            "failed to compare {} with {}",
            args.first.display(),
            args.second.display()
        )
    })?;
    info!(
        "Compared {} vs {} in {:.1} ms: geometry {}, altitude {}",
        args.first.display(),
        args.second.display(),
        t_compare.elapsed().as_secs_f64() * 1000.0,
        result.geometry.equal,
        result.altitude.within_tolerance
    );

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut handle, &result)?;
        writeln!(handle)?;
    } else {
        let options = ReportOptions {
            table_rows: args.verbose.then_some(args.table_rows),
        };
        handle.write_all(render_report(&result, &options).as_bytes())?;
    }
    Ok(result.exit_code())
}

fn load_track(path: &Path) -> Result<Track> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let hint = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let track =
        parse_track(&data, hint).with_context(|| format!("failed to parse {}", path.display()))?;
    debug!("Loaded {}: {} points", path.display(), track.len());
    Ok(track)
}

fn load_config(path: &Path) -> Result<VerifyConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: VerifyConfig = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid tolerance config", path.display()))?;
    Ok(config)
}

fn handle_batch(args: BatchArgs) -> Result<u8> {
    let config = args.tolerances.resolve()?;
    let pairs = read_manifest(&args.manifest)?;
    if pairs.is_empty() {
        return Err(anyhow!("manifest {} lists no pairs", args.manifest.display()));
    }

    let t_batch = Instant::now();
    let outcomes: Vec<PairOutcome> = pairs
        .par_iter()
        .map(|row| compare_pair(row, &config))
        .collect();

    let failures = outcomes.iter().filter(|o| o.error.is_some()).count();
    let equal = outcomes.iter().filter(|o| o.overall_equal).count();
    info!(
        "Batch of {} pairs in {:.1} ms: {} equal, {} errors",
        outcomes.len(),
        t_batch.elapsed().as_secs_f64() * 1000.0,
        equal,
        failures
    );

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_outcomes(&outcomes, &mut writer)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_outcomes(&outcomes, &mut writer)?;
        info!("Wrote batch results: {}", args.output.display());
    }

    Ok(batch_exit_code(&outcomes))
}

fn read_manifest(path: &Path) -> Result<Vec<PairRow>> {
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open manifest {}", path.display()))?;
    let mut rows = Vec::new();
    for (line, row) in reader.deserialize::<PairRow>().enumerate() {
        let row = row.with_context(|| format!("invalid manifest row {}", line + 1))?;
        rows.push(PairRow {
            a: base.join(row.a),
            b: base.join(row.b),
        });
    }
    Ok(rows)
}

fn compare_pair(row: &PairRow, config: &VerifyConfig) -> PairOutcome {
    let a = row.a.display().to_string();
    let b = row.b.display().to_string();
    let result = load_track(&row.a).and_then(|ta| {
        let tb = load_track(&row.b)?;
        Ok(compare_tracks(&ta, &tb, config)?)
    });
    match result {
        Ok(result) => PairOutcome {
            a,
            b,
            geometry_equal: Some(result.geometry.equal),
            altitude_within_tolerance: Some(result.altitude.within_tolerance),
            max_diff_m: Some(result.altitude.max_diff_m),
            avg_diff_m: Some(result.altitude.avg_diff_m),
            overall_equal: result.overall_equal,
            exit_code: result.exit_code(),
            error: None,
        },
        Err(err) => {
            warn!("Pair {} / {} failed: {:#}", a, b, err);
            PairOutcome {
                a,
                b,
                geometry_equal: None,
                altitude_within_tolerance: None,
                max_diff_m: None,
                avg_diff_m: None,
                overall_equal: false,
                exit_code: failure_code(&err),
                error: Some(format!("{:#}", err)),
            }
        }
    }
}

fn write_outcomes<W: Write>(outcomes: &[PairOutcome], writer: &mut csv::Writer<W>) -> Result<()> {
    for outcome in outcomes {
        writer.serialize(outcome)?;
    }
    writer.flush()?;
    Ok(())
}

/// 0 when every pair matched, 2 if any pair hit a hard failure, else 1.
fn batch_exit_code(outcomes: &[PairOutcome]) -> u8 {
    if outcomes.iter().any(|o| o.exit_code == EXIT_FAILURE) {
        EXIT_FAILURE
    } else if outcomes.iter().all(|o| o.exit_code == EXIT_EQUAL) {
        EXIT_EQUAL
    } else {
        EXIT_NOT_EQUAL
    }
}
