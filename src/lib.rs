//! `aterm`: capability-passing JSON-lines RPC between a terminal host and
//! the driver process it spawns.
//!
//! The [`rpc`] module holds the protocol engine; [`wire`] its framing and
//! envelopes. [`terminal`] and [`shell`] are the two roles the binaries play
//! on top of it.

#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod ipc;
pub mod logging;
pub mod rpc;
pub mod shell;
pub mod terminal;
pub mod value;
pub mod wire;

pub use config::Config;
pub use errors::{AppError, Result};
pub use rpc::{Endpoint, Proxy};
pub use value::{Function, Object, Record, Reply, Symbol, Value};
