//! echo-stream: HTTP throughput test server.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                 ECHO-STREAM                  │
//!                          │                                              │
//!     Client Request       │  ┌─────────┐    ┌─────────┐    ┌──────────┐  │
//!     ─────────────────────┼─▶│   net   │───▶│  http   │───▶│ handlers │  │
//!                          │  │listener │    │ server  │    └────┬─────┘  │
//!                          │  └─────────┘    └─────────┘         │        │
//!                          │                                     ▼        │
//!     Client Response      │                              ┌──────────┐    │
//!     ◀────────────────────┼──────────────────────────────│ transfer │    │
//!                          │                              │ up/down  │    │
//!                          │                              └──────────┘    │
//!                          │  ┌────────────────────────────────────────┐  │
//!                          │  │  config · observability · lifecycle    │  │
//!                          │  └────────────────────────────────────────┘  │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use echo_stream::config::{load_config, loader::set_port, validation::validate_config};
use echo_stream::lifecycle::startup;
use echo_stream::observability::logging;

#[derive(Parser)]
#[command(name = "echo-stream", version, about = "HTTP throughput test server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overrides the config file and PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("echo-stream: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = args.port {
        set_port(&mut config, port);
        if let Err(errors) = validate_config(&config) {
            for error in errors {
                eprintln!("echo-stream: {error}");
            }
            return ExitCode::FAILURE;
        }
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "echo-stream starting");

    match startup::launch(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server terminated");
            ExitCode::FAILURE
        }
    }
}
