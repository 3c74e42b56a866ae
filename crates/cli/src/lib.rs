pub mod commands;

use clap::{Parser, Subcommand};
use groundline_core::config::LoadOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use commands::infer::InferArgs;
use commands::snapshot::SnapshotArgs;

#[derive(Debug, Parser)]
#[command(
    name = "groundline",
    about = "Groundline operator CLI",
    long_about = "Build activity snapshots from quotes and invoices and turn them into one grounded, time-boxed decision.",
    after_help = "Examples:\n  groundline snapshot --records records.json\n  groundline infer --records records.json --generator mock\n  groundline config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to groundline.toml (defaults to ./groundline.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Build a Snapshot from a record bundle and print it as JSON")]
    Snapshot(SnapshotArgs),
    #[command(about = "Produce one grounded Conclusion with diagnostics from a Snapshot or records")]
    Infer(InferArgs),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    let result = match cli.command {
        Command::Snapshot(args) => commands::snapshot::run(&args, options),
        Command::Infer(args) => commands::infer::run(&args, options),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
