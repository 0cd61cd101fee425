//! Command loop run by the `aterm-shell` driver against the host terminal.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::rpc::Proxy;
use crate::{AppError, Result};

/// Print one line on the host terminal.
///
/// # Errors
///
/// Propagates the failure of the remote `print` call.
pub async fn print(main: &Proxy, text: &str) -> Result<()> {
    main.invoke_method("print", vec![text.into()]).await?;
    Ok(())
}

/// Read lines from the host until `exit` or end of input, starting each one
/// as a command.
///
/// Commands run concurrently with the input loop. `exit` returns at once and
/// kills any command still running; end of input waits for them to finish.
///
/// # Errors
///
/// Fails if any call to the host fails.
pub async fn run_shell(main: &Proxy) -> Result<()> {
    print(main, "init").await?;
    let input = main.invoke_method("input", Vec::new()).await?;
    let mut commands = JoinSet::new();

    loop {
        let line = input.call_method("pop", Vec::new()).await?;
        let Some(line) = line.as_str() else {
            info!(running = commands.len(), "shell: input exhausted");
            while let Some(done) = commands.join_next().await {
                done.map_err(|e| AppError::Fatal(format!("command task failed: {e}")))??;
            }
            break;
        };
        print(main, line).await?;

        let line = line.trim();
        if line == "exit" {
            // Dropping the set aborts the tasks, and with them the children.
            info!(running = commands.len(), "shell: exit requested");
            break;
        }
        if !line.is_empty() {
            let main = main.clone();
            let line = line.to_owned();
            commands.spawn(async move { run_command(&main, &line).await });
        }
    }

    Ok(())
}

/// Run `line` as `cmd args…`, forwarding its output to the host.
///
/// A command that cannot be started is reported on the terminal, not
/// returned as an error.
///
/// # Errors
///
/// Fails if any call to the host fails.
pub async fn run_command(main: &Proxy, line: &str) -> Result<()> {
    let mut words = line.split_whitespace();
    let Some(program) = words.next() else {
        return Ok(());
    };

    let spawned = Command::new(program)
        .args(words)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            warn!(program, %err, "shell: failed to start command");
            return print(main, &format!("Error: {err}")).await;
        }
    };
    debug!(program, pid = child.id(), "shell: command started");

    let stdout = child.stdout.take().map(|out| forward(main.clone(), out));
    let stderr = child.stderr.take().map(|err| forward(main.clone(), err));
    for task in [stdout, stderr].into_iter().flatten() {
        task.await
            .map_err(|e| AppError::Fatal(format!("output forwarder failed: {e}")))??;
    }

    let status = child.wait().await?;
    let code = status
        .code()
        .map_or_else(|| "null".to_owned(), |code| code.to_string());
    print(main, &format!("[exit: {code}]")).await
}

fn forward<R>(main: Proxy, stream: R) -> tokio::task::JoinHandle<Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Some(line) = lines.next_line().await? {
            print(&main, &line).await?;
        }
        Ok(())
    })
}
