//! TCP listener for indicator connections.
//!
//! The transport module binds the configured endpoint and accepts
//! connections in a background thread, handing each one to a
//! [`ConnectionHandler`] on its own thread.

mod errors;
mod listener;

use std::net::{SocketAddr, TcpStream};

pub use self::errors::ListenerError;
pub(crate) use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Handles accepted connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection until it closes. Runs on a dedicated
    /// thread; implementations should avoid panicking.
    fn handle(&self, stream: TcpStream, peer: SocketAddr);
}
