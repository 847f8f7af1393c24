//!
//! Command-line front end for converting beam-telescope runs.

use beampix_pipeline::{Config, Converter, Result, Run, RunOptions, RunSummary};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Convert raw beam-telescope runs into structured HDF5 stores.
#[derive(Parser)]
#[command(name = "beampix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Run number to process
    #[arg(short, long)]
    run: u32,

    /// Data directory holding raw/, data/ and proteus/
    #[arg(short, long)]
    data_dir: PathBuf,

    /// Configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conversion chain up to the structured store
    Convert {
        /// Re-run stages whose artifacts already exist
        #[arg(long)]
        force: bool,

        /// Comma-separated stage subset to run
        #[arg(long, value_delimiter = ',')]
        steps: Option<Vec<String>>,

        /// Keep intermediate tool artifacts after a full conversion
        #[arg(long)]
        keep_aux: bool,

        /// Limit the number of converted events
        #[arg(long)]
        max_events: Option<u64>,
    },

    /// Redo the alignment chain and every stage after it
    Realign,

    /// Show which stage artifacts exist for the run
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let run = Run::new(cli.run, &cli.data_dir)?;

    match cli.command {
        Commands::Convert {
            force,
            steps,
            keep_aux,
            max_events,
        } => {
            if let Some(limit) = max_events {
                config.converter.max_events = Some(limit);
            }
            let converter = Converter::new(&config, &run)?;
            let options = RunOptions {
                force,
                subset: steps,
                cleanup_aux: !keep_aux,
            };
            let summary = converter.convert(&options)?;
            print_summary(cli.run, &summary);
        }

        Commands::Realign => {
            let converter = Converter::new(&config, &run)?;
            let summary = converter.realign()?;
            print_summary(cli.run, &summary);
        }

        Commands::Status => {
            let converter = Converter::new(&config, &run)?;
            println!("Run {} in {}", cli.run, cli.data_dir.display());
            for stage in converter.status() {
                let marker = if stage.complete { 'x' } else { ' ' };
                println!("  [{marker}] {:<9} {}", stage.name, stage.artifact.display());
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_summary(run: u32, summary: &RunSummary) {
    for (name, duration) in &summary.durations {
        println!("  {name:<9} {:.2}s", duration.as_secs_f64());
    }
    if !summary.skipped.is_empty() {
        println!("Skipped: {}", summary.skipped.join(", "));
    }
    println!(
        "Run {run}: {} stage(s) in {:.2}s",
        summary.executed.len(),
        summary.elapsed.as_secs_f64()
    );
}
