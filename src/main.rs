//! Storage Instrumenter CLI Application
//!
//! A command-line interface for instrumenting and inspecting class archives.

use clap::{Parser, Subcommand};
use storage_instrumenter::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "instrumenter")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Instruments storage classes and entries of contract archives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Instrument an archive
    Instrument {
        /// Archive to instrument
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the instrumented archive
        #[arg(short, long)]
        output: PathBuf,

        /// Dependency archives (repeatable)
        #[arg(short, long)]
        lib: Vec<PathBuf>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List archive entries or disassemble a class
    Inspect {
        /// Archive to inspect
        #[arg(short, long)]
        input: PathBuf,

        /// Class to disassemble
        #[arg(short, long)]
        class: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Instrument {
            input,
            output,
            lib,
            config,
        } => cli::cmd_instrument(&input, &output, &lib, config.as_deref()),
        Commands::Inspect { input, class } => cli::cmd_inspect(&input, class.as_deref()),
    }
}
