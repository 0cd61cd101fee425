//! Namespaced local socket helpers.

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{AppError, Result};

pub use interprocess::local_socket::tokio::{Listener, Stream};

/// A fresh socket name, unique per host process.
#[must_use]
pub fn generate_name() -> String {
    format!("aterm-{}", Uuid::new_v4())
}

/// Bind a listener on the namespaced socket `name`.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the name is invalid or already bound.
pub fn listen(name: &str) -> Result<Listener> {
    let ns_name = name
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid socket name {name}: {err}")))?;

    let listener = ListenerOptions::new()
        .name(ns_name)
        .create_tokio()
        .map_err(|err| AppError::Ipc(format!("failed to bind socket {name}: {err}")))?;

    info!(name, "local socket listening");
    Ok(listener)
}

/// Wait for the next connection on `listener`.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the accept fails.
pub async fn accept(listener: &Listener) -> Result<Stream> {
    let stream = listener
        .accept()
        .await
        .map_err(|err| AppError::Ipc(format!("accept failed: {err}")))?;
    debug!("local socket connection accepted");
    Ok(stream)
}

/// Connect to the namespaced socket `name`.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the name is invalid or nothing is listening.
pub async fn connect(name: &str) -> Result<Stream> {
    let ns_name = name
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid socket name {name}: {err}")))?;

    let stream = Stream::connect(ns_name)
        .await
        .map_err(|err| AppError::Ipc(format!("failed to connect to {name}: {err}")))?;
    debug!(name, "local socket connected");
    Ok(stream)
}

/// Read the socket name the host exported in `var`.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the variable is unset, empty, or not UTF-8.
pub fn name_from_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(name) if !name.is_empty() => Ok(name),
        Ok(_) => Err(AppError::Ipc(format!("{var} is empty"))),
        Err(err) => Err(AppError::Ipc(format!("{var} is not available: {err}"))),
    }
}
