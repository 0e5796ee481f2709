//! HBNB storage console.
//!
//! # Responsibility
//! - Compose configuration, logging and the storage facade for one process.
//! - Run each invocation as one unit of work against the configured backend.

mod commands;

use clap::Parser;
use commands::Command;
use hbnb_core::{init_logging, AppConfig, Storage};
use log::info;
use std::error::Error;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "hbnb", version, about = "Inspect and edit HBNB storage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    // A missing .env file is normal; real variables still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("** {err} **");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    init_logging(&config.logging)?;

    let mut storage = Storage::open(&config.storage)?;
    info!(
        "event=cli_start module=cli status=ok backend={} command={}",
        storage.backend_kind().as_str(),
        command.name()
    );

    let mut work = storage.unit_of_work()?;
    let output = commands::execute(&mut work, command)?;
    work.finish()?;

    for line in output {
        println!("{line}");
    }
    Ok(())
}
