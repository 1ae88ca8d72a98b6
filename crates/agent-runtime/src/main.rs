//! # Agent Runtime
//!
//! Entry point. Without a subcommand the process supervises one worker per
//! built-in agent; with `calculator` or `factor` it serves that agent in the
//! foreground.
//!
//! ## Startup Sequence
//!
//! 1. Load `.env` (optional)
//! 2. Parse the command line
//! 3. Install logging (`AGENT_LOG`, `AGENT_LOG_FORMAT`)
//! 4. Run the worker or the supervisor until interrupted
//! 5. Exit with its code (see [`agent_runtime::exit`])

use anyhow::{Context, Result};
use clap::Parser;

use agent_runtime::{exit, run_from_env, run_worker, Cli};

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit::FAILURE
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    // Missing .env is fine; every setting has a default or is reported later.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let service = match &cli.command {
        Some(command) => command.kind().to_string(),
        None => "supervisor".to_string(),
    };
    if let Err(e) = agent_telemetry::init_from_env(&service) {
        eprintln!("Error: {}", e);
        return Ok(exit::CONFIG);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let code = runtime.block_on(async move {
        match cli.command {
            Some(command) => run_worker(command.into_options()).await,
            None => run_from_env().await,
        }
    });
    // A supervised worker may still have a blocking stdin read in flight,
    // which a regular runtime drop would wait for.
    runtime.shutdown_background();
    Ok(code)
}
