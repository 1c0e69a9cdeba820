use std::error::Error;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::doctor::DoctorArgs;
use commands::export::ExportArgs;
use commands::get::GetArgs;
use commands::list::ListArgs;
use commands::merge::MergeArgs;
use commands::run::RunArgs;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "gridrun", about = "Parameter-grid simulation orchestration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand a sweep plan and execute it against a collection root.
    Run(RunArgs),
    /// Look up the result directory for a parameter set.
    Get(GetArgs),
    /// List indexed results in insertion order.
    List(ListArgs),
    /// Export the index as a CSV table.
    Export(ExportArgs),
    /// Merge another collection's index into this root.
    Merge(MergeArgs),
    /// Audit the index against the directories on disk.
    Doctor(DoctorArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    match &cli.command {
        Command::Run(args) => commands::run::run(args),
        Command::Get(args) => commands::get::run(args),
        Command::List(args) => commands::list::run(args),
        Command::Export(args) => commands::export::run(args),
        Command::Merge(args) => commands::merge::run(args),
        Command::Doctor(args) => commands::doctor::run(args),
    }
}
