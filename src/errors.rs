//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

use crate::value::Value;

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering every failure mode of an endpoint and the
/// binaries built on it.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or stream I/O failure.
    Io(String),
    /// Local socket setup or connection failure.
    Ipc(String),
    /// Well-formed message that is missing fields, names an unknown method,
    /// or references an unknown object or request id.
    Validation(String),
    /// A call was rejected with an error value, either by the peer or by a
    /// local handler that wants the value delivered verbatim.
    Rejected(Value),
    /// The endpoint is no longer connected.
    Closed,
    /// Internal invariant violation; terminates the endpoint.
    Fatal(String),
}

impl AppError {
    /// Convenience constructor for rejecting a call with a plain message.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(Value::String(message.into()))
    }

    /// Whether the error must terminate the endpoint that hit it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Rejected(value) => write!(f, "rejected: {value}"),
            Self::Closed => write!(f, "closed: endpoint is not connected"),
            Self::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
