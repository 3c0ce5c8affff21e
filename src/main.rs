//! treestats command-line interface
//!
//! ```bash
//! treestats stats -i corpora/ -o records/
//! treestats vectorize -i records/ -o out/ --scaling min-max
//! treestats run corpora/ -o out/
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use treestats::batch::{self, Skipped};
use treestats::config::{Config, Scaling};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Typological fingerprints of languages from dependency treebanks
#[derive(Parser, Debug)]
#[command(name = "treestats")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Profile every corpus in a directory and write one record per language
    Stats {
        /// Directory of CoNLL-U corpora
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the records
        #[arg(short, long)]
        output: PathBuf,

        /// Worker threads
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Turn a directory of records into feature vectors
    Vectorize {
        /// Directory of records
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for vectors.json
        #[arg(short, long)]
        output: PathBuf,

        /// Feature scaling: none or min-max
        #[arg(long)]
        scaling: Option<Scaling>,
    },

    /// Profile corpora and vectorize the resulting records
    Run {
        /// Directory of CoNLL-U corpora
        corpora: PathBuf,

        /// Directory for the records; defaults to the output directory
        #[arg(short, long)]
        records: Option<PathBuf>,

        /// Directory for vectors.json
        #[arg(short, long)]
        output: PathBuf,

        /// Worker threads
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Feature scaling: none or min-max
        #[arg(long)]
        scaling: Option<Scaling>,
    },
}

fn init_logging(cli: &Cli) {
    let default = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn summarize(what: &str, skipped: &[Skipped]) {
    if !skipped.is_empty() {
        log::warn!("{} {what} skipped:", skipped.len());
        for skipped in skipped {
            log::warn!("  {skipped}");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Stats {
            input,
            output,
            jobs,
        } => {
            config.jobs = jobs.or(config.jobs);
            config.validate()?;
            let report = batch::run_stats(&input, &output, &config)
                .with_context(|| format!("profiling corpora in {}", input.display()))?;
            summarize("languages", &report.skipped);
        }
        Command::Vectorize {
            input,
            output,
            scaling,
        } => {
            config.scaling = scaling.unwrap_or(config.scaling);
            let report = batch::run_vectorize(&input, &output, &config)
                .with_context(|| format!("vectorizing records in {}", input.display()))?;
            summarize("records", &report.skipped);
        }
        Command::Run {
            corpora,
            records,
            output,
            jobs,
            scaling,
        } => {
            config.jobs = jobs.or(config.jobs);
            config.scaling = scaling.unwrap_or(config.scaling);
            config.validate()?;
            let records = records.unwrap_or_else(|| output.clone());
            let report = batch::run_stats(&corpora, &records, &config)
                .with_context(|| format!("profiling corpora in {}", corpora.display()))?;
            summarize("languages", &report.skipped);
            let report = batch::run_vectorize(&records, &output, &config)
                .with_context(|| format!("vectorizing records in {}", records.display()))?;
            summarize("records", &report.skipped);
        }
    }
    Ok(())
}
