#![forbid(unsafe_code)]

//! `aterm`: terminal host.
//!
//! Listens on a local socket, spawns the driver with the socket name in its
//! environment, and serves the terminal object to it: printed text goes to
//! stdout, stdin lines feed the driver's input queue.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use aterm::logging::{init_tracing, LogFormat};
use aterm::{ipc, terminal, AppError, Config, Endpoint, Object, Result};

/// Buffered stdin lines not yet popped by the driver.
const INPUT_CAPACITY: usize = 64;

/// How long shutdown waits for printed text to reach stdout.
const OUTPUT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "aterm", about = "Terminal host for RPC drivers", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the local socket name.
    #[arg(long)]
    socket_name: Option<String>,

    /// Driver command and arguments, after `--`.
    #[arg(last = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = Config::load_or_default(args.config.as_deref())?;
    init_tracing(args.log_format, &config.log_level)?;
    info!("aterm host bootstrap");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;
    let outcome = runtime.block_on(run(args, config));
    runtime.shutdown_timeout(OUTPUT_FLUSH_TIMEOUT);
    outcome
}

async fn run(args: Cli, config: Config) -> Result<()> {
    // ── Bind the socket ─────────────────────────────────
    let name = args
        .socket_name
        .or_else(|| config.socket_name.clone())
        .unwrap_or_else(ipc::generate_name);
    let listener = ipc::listen(&name)?;

    // ── Spawn the driver ────────────────────────────────
    let command = if args.command.is_empty() {
        config.driver.clone()
    } else {
        args.command
    };
    let mut child = spawn_driver(&command, &config.env_var, &name)?;

    // ── Terminal plumbing ───────────────────────────────
    let (handler, input, output) = terminal::channel(INPUT_CAPACITY);
    spawn_stdin_reader(input)?;
    let printer = tokio::spawn(async move {
        if let Err(err) = terminal::drain_output(output, tokio::io::stdout()).await {
            error!(%err, "failed to write terminal output");
        }
    });

    let outcome = serve(&listener, &mut child, handler, &name).await;

    // ── Flush what the driver printed last ──────────────
    if tokio::time::timeout(OUTPUT_FLUSH_TIMEOUT, printer).await.is_err() {
        warn!("terminal output still busy at shutdown, dropping the rest");
    }
    info!("aterm host shut down");
    outcome
}

/// Accept the driver and serve the terminal until the driver goes away.
///
/// `handler` is dropped on return, which closes the terminal output once
/// the endpoint is gone.
async fn serve(
    listener: &ipc::Listener,
    child: &mut Child,
    handler: Arc<dyn Object>,
    name: &str,
) -> Result<()> {
    let stream = tokio::select! {
        stream = ipc::accept(listener) => stream?,
        status = child.wait() => {
            report_exit(status?);
            warn!("driver exited before connecting");
            return Ok(());
        }
        () = shutdown_signal() => {
            info!("shutdown signal received before driver connected");
            return Ok(());
        }
    };
    let endpoint = Endpoint::spawn(stream, handler);
    info!(name, "driver connected");

    tokio::select! {
        status = child.wait() => report_exit(status?),
        () = endpoint.closed() => info!("driver connection closed"),
        () = shutdown_signal() => info!("shutdown signal received"),
    }

    endpoint.shutdown();
    if let Err(err) = endpoint.join().await {
        warn!(%err, "endpoint stopped with an error");
    }
    Ok(())
}

fn spawn_driver(command: &[String], env_var: &str, name: &str) -> Result<Child> {
    let Some((program, rest)) = command.split_first() else {
        return Err(AppError::Config("no driver command given".into()));
    };
    let child = Command::new(program)
        .args(rest)
        .env(env_var, name)
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| AppError::Io(format!("failed to spawn driver {program}: {err}")))?;
    info!(program, pid = child.id(), "driver spawned");
    Ok(child)
}

fn report_exit(status: ExitStatus) {
    match status.code() {
        Some(code) => info!(code, "driver exited"),
        None => info!("driver terminated by signal"),
    }
}

/// Feed stdin lines to the input queue from a plain thread.
///
/// A blocking stdin read cannot be cancelled, so it must not live on the
/// runtime: the process exits without waiting for it. Dropping `input` at
/// EOF makes the queue report end of input.
fn spawn_stdin_reader(input: mpsc::Sender<String>) -> Result<()> {
    thread::Builder::new()
        .name("aterm-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if input.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%err, "failed to read stdin");
                        break;
                    }
                }
            }
        })
        .map_err(|err| AppError::Io(format!("failed to start stdin reader: {err}")))?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}
