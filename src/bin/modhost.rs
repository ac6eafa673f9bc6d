//! Modhost maintenance CLI
//!
//! Drives the lifecycle orchestrator from the command line: migrate
//! everything, roll modules back, toggle enablement and inspect
//! dependency health. Progress notes stream to stdout line-by-line as
//! they occur.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use modhost::utils::init_logging;
use modhost::{HostConfig, LifecycleManager, ModuleError, NoteSink};

#[derive(Parser, Debug)]
#[command(name = "modhost", about = "Extension-module lifecycle manager")]
struct Args {
    /// Path to the host configuration file
    #[arg(long, default_value = "modhost.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations for every enabled module
    Update,
    /// Roll back every module and drop the migration store
    Uninstall,
    /// Roll back then re-update one module
    Refresh { id: String },
    /// Roll back one module completely
    Rollback { id: String },
    /// Disable a module
    Disable {
        id: String,
        /// Record the disable as user-initiated (the system cannot
        /// re-enable it)
        #[arg(long)]
        user: bool,
    },
    /// Enable a module
    Enable {
        id: String,
        /// Act as the user, overriding a user-initiated disable
        #[arg(long)]
        user: bool,
    },
    /// List declared dependencies missing from the registry
    Missing,
}

/// Streams notes to stdout as they are produced
struct StdoutSink;

impl NoteSink for StdoutSink {
    fn write_note(&mut self, line: &str) {
        println!("{}", line);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = if args.config.is_file() {
        match HostConfig::from_file(&args.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {:#}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        HostConfig::default()
    };

    init_logging(config.log_filter.as_deref());

    match run(config, args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: HostConfig, command: Command) -> Result<(), ModuleError> {
    let mut manager = LifecycleManager::open(config)?;
    manager.set_note_sink(Box::new(StdoutSink));

    // Maintenance commands never run module hooks
    manager.set_no_init(true);

    match command {
        Command::Update => manager.update(),
        Command::Uninstall => manager.uninstall(),
        Command::Refresh { id } => manager.refresh(&id),
        Command::Rollback { id } => manager.rollback_one(&id),
        Command::Disable { id, user } => {
            if manager.disable(&id, user)? {
                println!("Disabled: {}", id);
            } else {
                println!("Already disabled: {}", id);
            }
            Ok(())
        }
        Command::Enable { id, user } => {
            if manager.enable(&id, user)? {
                println!("Enabled: {}", id);
            } else {
                println!("Unable to enable: {}", id);
            }
            Ok(())
        }
        Command::Missing => {
            for id in manager.find_missing_dependencies() {
                println!("{}", id);
            }
            Ok(())
        }
    }
}
