//! Local socket transport between the host and its driver.
//!
//! Uses namespaced `interprocess` local sockets: abstract Unix domain
//! sockets on Linux, named pipes on Windows. The host listens, exports the
//! socket name through an environment variable, and the driver connects.

pub mod socket;

pub use socket::{accept, connect, generate_name, listen, name_from_env, Listener, Stream};
