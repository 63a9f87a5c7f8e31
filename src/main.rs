// ThreadSleuth - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Configuration loading and logging initialisation
// 3. Input expansion and parallel parsing
// 4. Summary, comparison and export output

use threadsleuth::app;
use threadsleuth::core;
use threadsleuth::platform;
use threadsleuth::util;

use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use util::error::ThreadSleuthError;

/// ThreadSleuth - JVM thread dump ingestion and analysis.
///
/// Reads gateway thread dumps in the JSON, web-page or script-console
/// formats and normalises them into one model.
#[derive(Parser, Debug)]
#[command(name = "ThreadSleuth", version, about)]
struct Cli {
    /// Dump files or directories to load (`-` reads standard input).
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Write the first loaded dump as canonical JSON.
    #[arg(long = "json", value_name = "FILE")]
    json: Option<PathBuf>,

    /// Write the first loaded dump as CSV, one row per thread.
    #[arg(long = "csv", value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Line threads up across all loaded dumps and show state changes.
    #[arg(short = 'c', long = "compare")]
    compare: bool,

    /// Only report the detected format of each input.
    #[arg(long = "detect")]
    detect: bool,

    /// Drop RMI/JDWP/JMX bookkeeping threads (live captures).
    #[arg(short = 'l', long = "live-capture")]
    live_capture: bool,

    /// Config file to use instead of the platform default.
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config is read before logging exists so its level can seed the filter;
    // warnings are replayed once the subscriber is installed. A file named
    // on the command line must load.
    let (config_path, loaded) = match cli.config.clone() {
        Some(path) => {
            let loaded = platform::config::load_config_from(&path);
            (path, loaded)
        }
        None => {
            let path = platform::config::PlatformPaths::resolve().config_file();
            let loaded = Ok(platform::config::load_config(&path));
            (path, loaded)
        }
    };
    let (config, config_warnings) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            util::logging::init(cli.debug, None);
            tracing::error!(error = %e, "Failed to load config");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    util::logging::init(cli.debug, config.log_level.as_deref());
    for warning in &config_warnings {
        tracing::warn!(path = %config_path.display(), "{}", warning);
    }

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "ThreadSleuth starting"
    );

    let mut options = config.parse_options();
    options.live_capture |= cli.live_capture;

    let (files, warnings) = app::load::expand_inputs(&cli.paths, util::constants::DEFAULT_MAX_DEPTH);
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    if files.is_empty() {
        eprintln!("No thread dump files found");
        return ExitCode::FAILURE;
    }

    if cli.detect {
        return report_dialects(&files, &options.limits);
    }

    let mut failed = false;
    let mut dumps = Vec::new();
    for (path, result) in app::load::load_all(&files, &options) {
        match result {
            Ok(dump) => {
                println!("{}", path.display());
                print!("{}", app::summary::DumpSummary::from_dump(&dump));
                dumps.push(dump);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load dump");
                eprintln!("{e}");
                failed = true;
            }
        }
    }

    if cli.compare && !dumps.is_empty() {
        print_comparison(&dumps);
    }

    if let Some(first) = dumps.first() {
        if dumps.len() > 1 && (cli.json.is_some() || cli.csv.is_some()) {
            tracing::warn!(loaded = dumps.len(), "Exporting the first loaded dump only");
        }
        if let Some(ref path) = cli.json {
            if let Err(e) = export(path, |w| {
                core::export::export_json(first, w, path, config.pretty_json)
            }) {
                eprintln!("{e}");
                failed = true;
            }
        }
        if let Some(ref path) = cli.csv {
            if let Err(e) = export(path, |w| core::export::export_csv(first, w, path)) {
                eprintln!("{e}");
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn report_dialects(files: &[PathBuf], limits: &core::detect::DetectionLimits) -> ExitCode {
    let mut failed = false;
    for path in files {
        let outcome = platform::fs::read_prefix_lossy(path, limits.max_bytes)
            .map_err(|e| ThreadSleuthError::Io {
                path: path.clone(),
                operation: "read dump prefix",
                source: e,
            })
            .and_then(|prefix| {
                core::detect::detect(&prefix, limits).map_err(|e| ThreadSleuthError::Dump {
                    path: path.clone(),
                    source: e,
                })
            });
        match outcome {
            Ok(dialect) => println!("{}: {dialect}", path.display()),
            Err(e) => {
                eprintln!("{e}");
                failed = true;
            }
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_comparison(dumps: &[core::model::ThreadDump]) {
    let rows = core::compare::compare(dumps);
    println!("Comparison across {} captures:", dumps.len());
    for row in rows.iter().filter(|r| r.changed()) {
        let cpu = row
            .max_cpu
            .map(|c| format!("{c:.2}%"))
            .unwrap_or_default();
        println!("  {:<40} {:<24} {cpu}", row.name, row.state_trail());
    }
    let unchanged = rows.iter().filter(|r| !r.changed()).count();
    println!("  ({unchanged} threads unchanged)");
}

fn export<F>(path: &Path, write: F) -> Result<(), ThreadSleuthError>
where
    F: FnOnce(BufWriter<File>) -> Result<usize, util::error::ExportError>,
{
    let file = File::create(path).map_err(|e| ThreadSleuthError::Io {
        path: path.to_path_buf(),
        operation: "create export file",
        source: e,
    })?;
    let rows = write(BufWriter::new(file))?;
    tracing::info!(path = %path.display(), rows, "Export written");
    Ok(())
}
