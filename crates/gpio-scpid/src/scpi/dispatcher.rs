//! Per-session command dispatch and the last-error register.

use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::pins::PinRegistry;

use super::SCPI_TARGET;
use super::command::{Command, CommandLine};
use super::errors::{ErrorEntry, ScpiError};
use super::handlers::{self, Reply};

/// Routes command lines to handlers and latches their failures.
///
/// Each session owns one dispatcher; the registry behind it is shared.
pub struct Dispatcher {
    registry: Arc<PinRegistry>,
    last_error: ErrorEntry,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty (`0,"No error"`) register.
    #[must_use]
    pub fn new(registry: Arc<PinRegistry>) -> Self {
        Self {
            registry,
            last_error: ErrorEntry::none(),
        }
    }

    /// Current contents of the last-error register.
    #[must_use]
    pub const fn last_error(&self) -> &ErrorEntry {
        &self.last_error
    }

    /// Executes one command line and returns its reply.
    ///
    /// Handler failures, including panics, become [`Reply::Error`] with the
    /// cause latched in the register; they never escape to the caller.
    pub fn dispatch(&mut self, line: &str) -> Reply {
        let CommandLine { keyword, params } = CommandLine::split(line);
        if keyword.is_empty() {
            return Reply::Error;
        }
        let Some(command) = Command::parse(keyword) else {
            return self.fail(&ScpiError::unknown_command(keyword));
        };
        if command == Command::ErrorQuery {
            let entry = mem::take(&mut self.last_error);
            return Reply::Value(entry.to_string());
        }

        let registry = &self.registry;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handlers::run(command, registry, params)
        }))
        .unwrap_or_else(|payload| {
            Err(ScpiError::command(panic_message(payload.as_ref())))
        });

        match outcome {
            Ok(reply) => {
                if command.records_success() && reply.clears_error() {
                    self.last_error = ErrorEntry::none();
                }
                reply
            }
            Err(error) => self.fail(&error),
        }
    }

    fn fail(&mut self, error: &ScpiError) -> Reply {
        if matches!(error, ScpiError::Command { .. }) {
            warn!(target: SCPI_TARGET, code = error.code(), %error, "command failed");
        } else {
            debug!(target: SCPI_TARGET, code = error.code(), %error, "command rejected");
        }
        self.last_error = ErrorEntry::from(error);
        Reply::Error
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("handler panicked")
    }
}
