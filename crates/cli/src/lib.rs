pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pharmline",
    about = "Pharmline inbound call agent CLI",
    long_about = "Answer simulated inbound pharmacy sales calls over stdin, inspect effective configuration, and run readiness checks.",
    after_help = "Examples:\n  pharmline call --phone 555-0001\n  pharmline config\n  pharmline doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Answer a simulated inbound call and converse over stdin until the caller hangs up"
    )]
    Call {
        #[arg(long, help = "Caller phone number presented to the directory lookup")]
        phone: Option<String>,
        #[arg(long, value_name = "PATH", help = "Config file to load instead of pharmline.toml")]
        config: Option<std::path::PathBuf>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, backend credential readiness, and directory reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Call { phone, config } => {
            commands::call::run(phone.as_deref(), config.as_deref())
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
