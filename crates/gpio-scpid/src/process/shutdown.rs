use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send {
    /// Returns `true` once shutdown has been requested, without blocking.
    fn triggered(&mut self) -> bool;

    /// Blocks until shutdown should proceed.
    fn wait(&mut self) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener driven by termination signals.
///
/// Handlers are registered on construction, so a signal that arrives while
/// pins are still being set up is queued rather than lost.
pub struct SystemShutdownSignal {
    signals: Signals,
    received: Option<i32>,
}

impl SystemShutdownSignal {
    /// Registers handlers for `SIGTERM`, `SIGINT`, `SIGQUIT`, and `SIGHUP`.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Install`] when registration fails.
    pub fn install() -> Result<Self, ShutdownError> {
        let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        Ok(Self {
            signals,
            received: None,
        })
    }

    fn record(&mut self, signal: i32) {
        info!(target: PROCESS_TARGET, signal, "shutdown signal received");
        self.received = Some(signal);
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn triggered(&mut self) -> bool {
        if self.received.is_none()
            && let Some(signal) = self.signals.pending().next()
        {
            self.record(signal);
        }
        self.received.is_some()
    }

    fn wait(&mut self) -> Result<(), ShutdownError> {
        if self.received.is_some() {
            return Ok(());
        }
        if let Some(signal) = self.signals.forever().next() {
            self.record(signal);
        }
        Ok(())
    }
}
