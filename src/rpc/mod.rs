//! Capability-passing RPC over a single duplex connection.
//!
//! An [`Endpoint`] owns one connection. It exposes a local handler object to
//! the peer under the fixed id `"main"` and hands the application a
//! [`Proxy`] for the peer's `"main"`. Any object or function passed as an
//! argument or returned as a result crosses by reference: the receiver gets
//! a proxy and calls back through it.
//!
//! - `registry`: exposed-object and proxy tables with identity reuse.
//! - `proxy`: remote stand-ins and bind-then-call member access.
//! - `pending`: correlation of outgoing requests with their replies.
//! - `endpoint`: the decode loop and request dispatch.
//! - `writer`: the task that owns the write half of the connection.

mod state;
pub mod endpoint;
pub mod pending;
pub mod proxy;
pub mod registry;
pub mod writer;

pub use endpoint::Endpoint;
pub use pending::PendingCalls;
pub use proxy::Proxy;
pub use registry::{Registry, ROOT_ID};
