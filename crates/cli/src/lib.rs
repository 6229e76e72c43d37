pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "ticketbooth",
    about = "Ticketbooth operator CLI",
    long_about = "Inspect Ticketbooth configuration, check deployment readiness, and print the slash command manifest.",
    after_help = "Examples:\n  ticketbooth doctor --json\n  ticketbooth config\n  ticketbooth manifest"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Discord token readiness, and profile API readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the /ticketsetup command registration payload")]
    Manifest,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Manifest => commands::manifest::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
