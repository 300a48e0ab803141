// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! cauth - multi-account OAuth credential manager for Claude Code.
//!
//! # Examples
//!
//! ```bash
//! # Save the currently-active credentials into a named profile
//! cauth save home
//!
//! # Make a saved profile's credentials active
//! cauth switch work
//!
//! # Rotate every profile's tokens and report usage
//! cauth refresh
//! ```

mod singleton;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cauth_engine::{EngineError, RotationEngine, TokenRefresher, TracingSink, UsageClient};
use cauth_host::{SecurityCliKeychain, SystemRunner};
use cauth_store::{migrate_legacy_store, Paths};

use singleton::SingletonGuard;

// ============================================================================
// CLI Definition
// ============================================================================

/// cauth - multi-account credential manager for Claude Code.
#[derive(Parser)]
#[command(name = "cauth")]
#[command(about = "Multi-account OAuth credential manager for Claude Code")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Save the currently-active credentials into a named profile.
    Save {
        /// Profile name.
        name: String,
    },
    /// Switch the active credentials to a named profile.
    Switch {
        /// Profile name.
        name: String,
    },
    /// Refresh all profiles and report usage quotas.
    Refresh,
}

/// CLI exit codes.
#[repr(i32)]
enum ExitCode {
    /// Operational error.
    Error = 1,
    /// Usage error.
    Usage = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("cauth: {err}");
        let code = match err.downcast_ref::<EngineError>() {
            Some(engine_err) if engine_err.is_usage() => ExitCode::Usage,
            _ => ExitCode::Error,
        };
        std::process::exit(code as i32);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let paths = Paths::discover()
        .ok_or_else(|| anyhow::anyhow!("could not determine home directory"))?;

    migrate_legacy_store(&paths).await;
    let _guard = SingletonGuard::acquire(&paths)?;

    let runner = Arc::new(SystemRunner::new());
    let keychain = Arc::new(SecurityCliKeychain::new(runner));
    let engine = RotationEngine::new(
        paths,
        keychain,
        TokenRefresher::new(),
        UsageClient::new(),
        Arc::new(TracingSink),
    );

    match cli.command {
        Commands::Save { name } => {
            let account_id = engine.save(&name).await?;
            println!("saved profile '{}' ({account_id})", name.trim());
        }
        Commands::Switch { name } => {
            engine.switch(&name).await?;
            println!("switched to profile '{name}'");
        }
        Commands::Refresh => {
            for line in engine.refresh_all().await? {
                println!("{line}");
            }
        }
    }

    Ok(())
}
