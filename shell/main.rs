#![forbid(unsafe_code)]

//! `aterm-shell`: minimal driver for the `aterm` host.
//!
//! Connects to the socket named in the environment and runs a command loop
//! against the host's terminal object.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use aterm::logging::{init_tracing, LogFormat};
use aterm::{ipc, shell, AppError, Config, Endpoint, Record, Result};

#[derive(Debug, Parser)]
#[command(name = "aterm-shell", about = "Command shell driven through aterm", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    let config = match Config::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let Ok(name) = ipc::name_from_env(&config.env_var) else {
        eprintln!("cannot open terminal");
        return ExitCode::from(2);
    };

    if let Err(err) = init_tracing(args.log_format, &config.log_level) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    match run(&name) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "aterm-shell failed");
            ExitCode::FAILURE
        }
    }
}

fn run(name: &str) -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(async {
            let stream = ipc::connect(name).await?;
            let endpoint = Endpoint::spawn(stream, Arc::new(Record::new()));
            info!(name, "connected to terminal");

            let outcome = shell::run_shell(&endpoint.root()).await;
            endpoint.shutdown();
            outcome
        })
}
