//! login-throttle - operator tool for the login throttle
//!
//! Inspects and edits the persisted per-identity throttle state, and shows or
//! initialises the throttle configuration file.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use throttle_core::{FileKeyValueStore, IdentityId, SystemClock, ThrottleConfig};

#[derive(Parser)]
#[command(name = "login-throttle")]
#[command(about = "Inspect and manage escalating login throttle state", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "LOGIN_THROTTLE_CONFIG")]
    config: Option<PathBuf>,

    /// Throttle state file (JSON)
    #[arg(long, global = true, env = "LOGIN_THROTTLE_STATE")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stored state and current access for an identity
    Status {
        identity: IdentityId,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether an identity may sign in (exit code 2 when denied)
    Check { identity: IdentityId },

    /// Record one failed sign-in for an identity
    Fail { identity: IdentityId },

    /// Clear throttle state for an identity (manual unlock)
    Reset { identity: IdentityId },

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "login_throttle=info,throttle_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.unwrap_or_else(ThrottleConfig::default_path);
    let state_path = cli.state.unwrap_or_else(FileKeyValueStore::default_path);

    let identity_command = match cli.command {
        Commands::Config(ConfigCommands::Init { force }) => {
            println!("{}", commands::config_init(&config_path, force)?);
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Config(ConfigCommands::Show) => {
            let config = ThrottleConfig::load_or_default(&config_path)?;
            print!("{}", commands::config_show(&config)?);
            return Ok(ExitCode::SUCCESS);
        }
        other => other,
    };

    let config = ThrottleConfig::load_or_default(&config_path)?;
    debug!(config = ?config_path, state = ?state_path, "Loaded throttle configuration");
    let engine = commands::open_engine(&config, &state_path)?;
    let clock = SystemClock;

    match identity_command {
        Commands::Status { identity, json } => {
            println!("{}", commands::status(&engine, &clock, identity, json)?);
        }
        Commands::Check { identity } => {
            let (allowed, text) = commands::check(&engine, &clock, identity)?;
            println!("{}", text);
            if !allowed {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Fail { identity } => {
            println!("{}", commands::fail(&engine, &clock, identity)?);
        }
        Commands::Reset { identity } => {
            println!("{}", commands::reset(&engine, identity)?);
        }
        Commands::Config(_) => {}
    }

    Ok(ExitCode::SUCCESS)
}
