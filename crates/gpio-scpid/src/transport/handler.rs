//! Connection handling abstraction for the listener.

use std::net::{SocketAddr, TcpStream};

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection until it ends. Runs on a dedicated thread;
    /// implementations should avoid panicking.
    fn handle(&self, stream: TcpStream, peer: SocketAddr);
}
