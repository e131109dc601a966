use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use ccfrp_cpue::{write_table, CpueError, CpuePipeline, ProtocolConfig};

/// Compute catch-per-unit-effort tables from a CCFRP survey export.
#[derive(Parser, Debug)]
#[command(name = "ccfrp-cpue", version, about)]
struct Cli {
    /// Directory holding the trip, drift, catch and species CSV files.
    data_dir: PathBuf,

    /// Wide CPUE table (CSV, or Parquet for a .parquet path).
    #[arg(short, long, default_value = "cpue.csv")]
    output: PathBuf,

    /// Protocol overrides (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Long-form Total CPUE table.
    #[arg(long)]
    long_output: Option<PathBuf>,

    /// Total CPUE summarized by number of anglers fishing.
    #[arg(long)]
    summary_output: Option<PathBuf>,

    /// All catch records with a known drift and species, unfiltered.
    #[arg(long)]
    all_catch_output: Option<PathBuf>,

    /// Log per-stage detail.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CpueError> {
    let protocol = match &cli.config {
        Some(path) => ProtocolConfig::load(path)?,
        None => ProtocolConfig::default(),
    };
    let pipeline = CpuePipeline::new(protocol)?;
    let tables = pipeline.load(&cli.data_dir)?;
    let output = pipeline.run(&tables)?;

    // Build every requested table before writing any of them.
    let mut outputs = vec![(output.cpue_frame()?, cli.output.clone())];
    if let Some(path) = &cli.long_output {
        outputs.push((output.total_long()?, path.clone()));
    }
    if let Some(path) = &cli.summary_output {
        outputs.push((output.angler_summary()?, path.clone()));
    }
    if let Some(path) = &cli.all_catch_output {
        outputs.push((output.all_catch.clone(), path.clone()));
    }

    for (mut df, path) in outputs {
        write_table(&mut df, &path)?;
    }
    Ok(())
}
