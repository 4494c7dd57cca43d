//! Test helpers for the transport module.

use std::net::{SocketAddr, TcpStream};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use super::ConnectionHandler;

/// Counts connections and remembers the peers it was handed.
pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
    peers: Mutex<Vec<SocketAddr>>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
            peers: Mutex::new(Vec::new()),
        });
        (count, handler)
    }

    pub(crate) fn peers(&self) -> Vec<SocketAddr> {
        self.peers.lock().map(|peers| peers.clone()).unwrap_or_default()
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: TcpStream, peer: SocketAddr) {
        if let Ok(mut peers) = self.peers.lock() {
            peers.push(peer);
        }
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
