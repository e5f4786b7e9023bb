//! linprobe - Linearizability checking from the command line.
//!
//! Runs a registered reference target under a [`CheckConfig`] loaded from
//! TOML, prints the outcome and optionally writes a JSON or Markdown report.
//!
//! # Usage
//!
//! ```bash
//! # List the registered targets
//! linprobe --list-targets
//!
//! # Check a target with the default configuration
//! linprobe --target racy-set
//!
//! # Use a configuration file and replay a seed
//! linprobe --config run.toml --seed 1234 --report failure.md
//! ```
//!
//! The process exits with 0 when every iteration passes, 1 on a violation
//! or unexpected exception, 2 on configuration or generator errors and 3
//! when execution itself failed.
//!
//! [`CheckConfig`]: linprobe_core::CheckConfig

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use config::CliConfig;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use linprobe_report::{JsonReportGenerator, MarkdownReportGenerator, RunReport};
use linprobe_targets::TARGETS;

/// Exit code for errors raised before a run starts.
const CONFIG_EXIT_CODE: u8 = 2;

/// CLI arguments for linprobe.
#[derive(Parser, Debug)]
#[command(
    name = "linprobe",
    about = "Randomized linearizability checking of concurrent structures",
    version,
    author
)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Target to check.
    #[arg(short, long, value_name = "NAME")]
    target: Option<String>,

    /// Number of scenarios to generate.
    #[arg(short, long, value_name = "N")]
    iterations: Option<usize>,

    /// Generation seed; replays an earlier run.
    #[arg(short, long, value_name = "SEED")]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enable JSON log output.
    #[arg(long)]
    json_logs: bool,

    /// Write a report to this path (Markdown for `.md`, JSON otherwise).
    #[arg(short, long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Print the default configuration and exit.
    #[arg(long)]
    print_config: bool,

    /// List the registered targets and exit.
    #[arg(long)]
    list_targets: bool,
}

/// Initializes the tracing subscriber.
fn init_tracing(config: &config::LoggingConfig, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Failed to parse log filter")?;

    let format = if json_logs || config.format == "json" {
        "json"
    } else {
        &config.format
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact())
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
    }

    Ok(())
}

/// Loads the configuration and applies CLI overrides.
fn load_config(args: &CliArgs) -> Result<CliConfig> {
    let mut config = if let Some(ref config_path) = args.config {
        CliConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };
    config.merge_cli_args(args);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let markdown = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
    if markdown {
        MarkdownReportGenerator::new().generate_to_file(report, path)?;
    } else {
        JsonReportGenerator::new().generate_to_file(report, path)?;
    }
    info!(path = %path.display(), "Report written");
    Ok(())
}

/// Runs the configured target and returns the process exit code.
fn run(args: &CliArgs) -> Result<u8> {
    if args.list_targets {
        for target in TARGETS {
            println!("{:<16} {}", target.name, target.description);
        }
        return Ok(0);
    }

    if args.print_config {
        println!("{}", CliConfig::default().to_toml()?);
        return Ok(0);
    }

    let config = load_config(args)?;
    init_tracing(&config.logging, args.json_logs)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        target_name = %config.target,
        "linprobe starting"
    );

    let target = linprobe_targets::find(&config.target)
        .with_context(|| format!("Unknown target: {}", config.target))?;
    let result = target.run(config.check.clone());
    let report = RunReport::from_result(target.name, &config.check, &result);

    match &result {
        Ok(summary) => println!(
            "{}: {} iterations passed ({} executions, {} inconclusive, seed {})",
            target.name,
            summary.iterations,
            summary.executions,
            summary.inconclusive,
            summary.seed
        ),
        Err(err) => match err.failure() {
            Some(failure) => eprintln!("{failure}"),
            None => error!(error = %err, "Run failed"),
        },
    }

    if let Some(ref path) = args.report {
        write_report(&report, path)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
    }

    Ok(report.exit_code())
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(CONFIG_EXIT_CODE)
        }
    }
}
