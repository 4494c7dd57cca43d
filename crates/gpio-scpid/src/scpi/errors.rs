//! Error taxonomy reported through the `SYST:ERR?` register.

use std::fmt;

use thiserror::Error;

use crate::pins::{DriverError, PinId, RegistryError};

/// A failed command. [`ScpiError::code`] and `Display` form the register
/// entry a client reads back with `SYST:ERR?`.
#[derive(Debug, Error)]
pub enum ScpiError {
    /// `*RST` could not release the pins.
    #[error("Reset error: {source}")]
    Reset {
        /// Registry failure.
        #[source]
        source: RegistryError,
    },
    /// Parameters were missing or had the wrong shape.
    #[error("Invalid parameters. Use: {usage}")]
    InvalidParameters {
        /// Expected usage of the command.
        usage: &'static str,
    },
    /// The pin number is not in the pin table.
    #[error("Invalid pin {pin}")]
    InvalidPin {
        /// Pin number as the client sent it.
        pin: i64,
    },
    /// The direction was not `in` or `out`.
    #[error("Direction must be 'in' or 'out'")]
    InvalidDirection,
    /// The driver could not open the pin.
    #[error("Failed to setup GPIO {pin}")]
    SetupFailed {
        /// Pin being set up.
        pin: PinId,
        /// Driver failure.
        #[source]
        source: DriverError,
    },
    /// The pin parameter is not an integer.
    #[error("Invalid pin number")]
    InvalidPinNumber,
    /// Setup failed for a reason other than the driver.
    #[error("Setup error: {source}")]
    Setup {
        /// Registry failure.
        #[source]
        source: RegistryError,
    },
    /// The pin has not been set up.
    #[error("GPIO {pin} not initialized")]
    NotInitialized {
        /// Requested pin.
        pin: PinId,
    },
    /// The value literal is not recognised.
    #[error("Invalid value. Use: 0/1, ON/OFF, HIGH/LOW, TRUE/FALSE")]
    InvalidValue,
    /// Writing the pin failed.
    #[error("Write error: {}", cause(.source))]
    Write {
        /// Registry failure.
        #[source]
        source: RegistryError,
    },
    /// Reading the pin failed.
    #[error("Read error: {}", cause(.source))]
    Read {
        /// Registry failure.
        #[source]
        source: RegistryError,
    },
    /// Toggling the pin failed.
    #[error("Toggle error: {}", cause(.source))]
    Toggle {
        /// Registry failure.
        #[source]
        source: RegistryError,
    },
    /// The status scan could not run.
    #[error("Status error: {source}")]
    Status {
        /// Registry failure.
        #[source]
        source: RegistryError,
    },
    /// A handler failed unexpectedly.
    #[error("Command error: {message}")]
    Command {
        /// Description of the failure.
        message: String,
    },
    /// The keyword is not recognised.
    #[error("Unknown command: {keyword}")]
    UnknownCommand {
        /// Upper-cased keyword.
        keyword: String,
    },
}

impl ScpiError {
    /// Numeric code stored in the last-error register.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Reset { .. } => 1,
            Self::InvalidParameters { .. } => 2,
            Self::InvalidPin { .. } => 3,
            Self::InvalidDirection => 4,
            Self::SetupFailed { .. } => 5,
            Self::InvalidPinNumber => 6,
            Self::Setup { .. } => 7,
            Self::NotInitialized { .. } => 8,
            Self::InvalidValue => 9,
            Self::Write { .. } => 10,
            Self::Read { .. } => 11,
            Self::Toggle { .. } => 12,
            Self::Status { .. } => 13,
            Self::Command { .. } => 99,
            Self::UnknownCommand { .. } => 100,
        }
    }

    /// Creates a generic command error.
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Creates an unknown command error, upper-casing the keyword.
    #[must_use]
    pub fn unknown_command(keyword: &str) -> Self {
        Self::UnknownCommand {
            keyword: keyword.to_ascii_uppercase(),
        }
    }
}

// Driver failures already name the pin; show them without the registry prefix.
fn cause(error: &RegistryError) -> &dyn fmt::Display {
    match error {
        RegistryError::Driver { source, .. } => source,
        other => other,
    }
}

/// Contents of a session's last-error register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    code: u16,
    message: String,
}

impl ErrorEntry {
    /// The `0,"No error"` entry.
    #[must_use]
    pub fn none() -> Self {
        Self {
            code: 0,
            message: String::from("No error"),
        }
    }

    /// Numeric code, `0` when no error is latched.
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for ErrorEntry {
    fn default() -> Self {
        Self::none()
    }
}

impl From<&ScpiError> for ErrorEntry {
    fn from(error: &ScpiError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{},\"{}\"",
            self.code,
            self.message.replace('"', "\"\"")
        )
    }
}
