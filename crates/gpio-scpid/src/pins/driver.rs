//! Seam between the registry and whatever actually toggles the lines.

use std::fmt;
use std::io;
use std::str::FromStr;

use thiserror::Error;

use super::table::PinId;

/// Electrical direction a line is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Line is sampled.
    In,
    /// Line is driven.
    Out,
}

impl Direction {
    /// Keyword used by both SCPI and sysfs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned when a direction keyword is not `in` or `out`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported direction: {0}")]
pub struct DirectionParseError(String);

impl DirectionParseError {
    /// Returns the offending value that could not be parsed.
    #[must_use]
    pub fn value(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for Direction {
    type Err = DirectionParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            other => Err(DirectionParseError(other.to_owned())),
        }
    }
}

/// Failures reported by a pin driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The operating system rejected an operation on the line.
    #[error("failed to {action} GPIO {pin}: {source}")]
    Io {
        /// Line the operation targeted.
        pin: PinId,
        /// Short verb describing the operation, for example `export`.
        action: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The line's attributes did not appear in time after export.
    #[error("GPIO {pin} was not ready after {waited_ms} ms")]
    NotReady {
        /// Line that was exported.
        pin: PinId,
        /// How long the driver waited.
        waited_ms: u64,
    },
    /// The line reported something other than `0` or `1`.
    #[error("GPIO {pin} reported unexpected value {value:?}")]
    UnexpectedValue {
        /// Line that was read.
        pin: PinId,
        /// Raw text returned by the driver.
        value: String,
    },
    /// The driver refused the operation for a driver-specific reason.
    #[error("GPIO {pin}: {message}")]
    Rejected {
        /// Line the operation targeted.
        pin: PinId,
        /// Human-readable reason.
        message: String,
    },
}

impl DriverError {
    /// Line the failure relates to.
    #[must_use]
    pub const fn pin(&self) -> PinId {
        match self {
            Self::Io { pin, .. }
            | Self::NotReady { pin, .. }
            | Self::UnexpectedValue { pin, .. }
            | Self::Rejected { pin, .. } => *pin,
        }
    }

    /// Builds an IO failure for `pin`.
    #[must_use]
    pub fn io(pin: PinId, action: &'static str, source: io::Error) -> Self {
        Self::Io {
            pin,
            action,
            source,
        }
    }

    /// Builds a driver-specific refusal for `pin`.
    #[must_use]
    pub fn rejected(pin: PinId, message: impl Into<String>) -> Self {
        Self::Rejected {
            pin,
            message: message.into(),
        }
    }
}

/// Opens lines on behalf of the registry.
pub trait PinDriver: Send + Sync {
    /// Opens `pin` in `direction`, returning an exclusive handle.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the line cannot be claimed or configured.
    fn open(&self, pin: PinId, direction: Direction) -> Result<Box<dyn PinHandle>, DriverError>;
}

/// An open line. Only the registry holds these.
pub trait PinHandle: Send {
    /// Samples the line.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the line cannot be read.
    fn read(&mut self) -> Result<bool, DriverError>;

    /// Drives the line high (`true`) or low (`false`).
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the line cannot be written.
    fn write(&mut self, value: bool) -> Result<(), DriverError>;

    /// Releases the line. Callers treat failures as best-effort and log them.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the driver could not release the line.
    fn close(&mut self) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::lower("in", Direction::In)]
    #[case::upper("OUT", Direction::Out)]
    #[case::padded(" out ", Direction::Out)]
    fn direction_parses_case_insensitively(#[case] input: &str, #[case] expected: Direction) {
        assert_eq!(input.parse::<Direction>().expect("parse direction"), expected);
    }

    #[test]
    fn direction_rejects_other_keywords() {
        let error = "both".parse::<Direction>().expect_err("should reject");
        assert_eq!(error.value(), "both");
    }

    #[test]
    fn driver_error_reports_its_pin() {
        let error = DriverError::rejected(55, "busy");
        assert_eq!(error.pin(), 55);
        assert_eq!(error.to_string(), "GPIO 55: busy");
    }
}
