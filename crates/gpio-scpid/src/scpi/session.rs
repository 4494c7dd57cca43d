//! One TCP client: banner, framing, dispatch, and replies.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{info, warn};

use crate::pins::PinRegistry;
use crate::transport::ConnectionHandler;

use super::SCPI_TARGET;
use super::dispatcher::Dispatcher;
use super::framer::{FramerError, LineFramer};

const READ_CHUNK: usize = 1024;

/// Why a session stopped.
#[derive(Debug, Error)]
pub enum SessionEnd {
    /// The client closed its side of the connection.
    #[error("peer closed the connection")]
    PeerClosed,
    /// No data arrived within the idle timeout.
    #[error("idle timeout elapsed")]
    IdleTimeout,
    /// Reading from the socket failed.
    #[error("read failed: {0}")]
    ReadFailed(#[source] io::Error),
    /// Writing a reply failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),
    /// The client sent an oversized line.
    #[error(transparent)]
    LineTooLong(#[from] FramerError),
}

/// Banner line sent on connect, without its terminator.
#[must_use]
pub fn banner(now: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let stamp = now.format(format).unwrap_or_else(|_| now.to_string());
    format!("# LuckFox GPIO SCPI Server Ready - {stamp}")
}

/// Local time when the offset can be determined, UTC otherwise.
fn banner_time() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Protocol loop for a single client stream.
pub struct Session<S> {
    stream: S,
    peer: SocketAddr,
    framer: LineFramer,
    dispatcher: Dispatcher,
}

impl<S: Read + Write> Session<S> {
    /// Creates a session with a fresh framer and dispatcher.
    pub fn new(stream: S, peer: SocketAddr, registry: Arc<PinRegistry>) -> Self {
        Self {
            stream,
            peer,
            framer: LineFramer::new(),
            dispatcher: Dispatcher::new(registry),
        }
    }

    /// Sends the banner and serves commands until the connection ends.
    ///
    /// A read that reports `WouldBlock` or `TimedOut` is taken as the idle
    /// timeout configured on the underlying socket.
    pub fn run(mut self) -> SessionEnd {
        if let Err(error) = self.send_line(&banner(banner_time())) {
            return SessionEnd::WriteFailed(error);
        }
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            let read = match read_with_retry(&mut self.stream, &mut chunk) {
                Ok(0) => return SessionEnd::PeerClosed,
                Ok(read) => read,
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return SessionEnd::IdleTimeout;
                }
                Err(error) => return SessionEnd::ReadFailed(error),
            };
            let lines = match self.framer.push(chunk.get(..read).unwrap_or_default()) {
                Ok(lines) => lines,
                Err(error) => return SessionEnd::LineTooLong(error),
            };
            for line in lines {
                info!(target: SCPI_TARGET, peer = %self.peer, command = %line, "SCPI command");
                let reply = self.dispatcher.dispatch(&line);
                if let Err(error) = self.send_line(&reply.to_string()) {
                    return SessionEnd::WriteFailed(error);
                }
            }
        }
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()
    }
}

fn read_with_retry<S: Read>(stream: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            outcome => return outcome,
        }
    }
}

/// Serves SCPI sessions for the listener.
pub struct ScpiConnectionHandler {
    registry: Arc<PinRegistry>,
    idle_timeout: Duration,
}

impl ScpiConnectionHandler {
    /// Creates a handler sharing `registry` across all sessions.
    #[must_use]
    pub const fn new(registry: Arc<PinRegistry>, idle_timeout: Duration) -> Self {
        Self {
            registry,
            idle_timeout,
        }
    }
}

impl ConnectionHandler for ScpiConnectionHandler {
    fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        info!(target: SCPI_TARGET, %peer, "SCPI client connected");
        if let Err(error) = stream.set_read_timeout(Some(self.idle_timeout)) {
            warn!(target: SCPI_TARGET, %peer, %error, "failed to set idle timeout");
            return;
        }

        let end = Session::new(&stream, peer, Arc::clone(&self.registry)).run();
        match &end {
            SessionEnd::PeerClosed => {
                info!(target: SCPI_TARGET, %peer, "SCPI client disconnected");
            }
            SessionEnd::IdleTimeout => {
                info!(target: SCPI_TARGET, %peer, "SCPI client timed out");
            }
            other => {
                warn!(target: SCPI_TARGET, %peer, error = %other, "SCPI session failed");
            }
        }

        if let Err(error) = stream.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            warn!(target: SCPI_TARGET, %peer, %error, "failed to close SCPI socket");
        }
    }
}
