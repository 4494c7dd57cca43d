//! One function per command. Handlers validate parameters, call the registry,
//! and describe failures with [`ScpiError`]; none of them touch the register.

use std::fmt;

use crate::pins::{Direction, PinId, PinRegistry, PinTable, RegistryError};

use super::command::Command;
use super::errors::ScpiError;

/// Identification returned by `*IDN?`.
pub const IDENTITY: &str = "LuckFox,GPIO-Controller,v1.0,2025";

/// Reply written back to the client for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command succeeded without a value.
    Ok,
    /// Command failed; details are in the last-error register.
    Error,
    /// Query result.
    Value(String),
    /// `GPIO:STATUS?` with no active pins.
    NoActivePins,
}

impl Reply {
    /// Whether this success resets the last-error register.
    ///
    /// An empty status scan reads nothing and leaves the register alone.
    #[must_use]
    pub const fn clears_error(&self) -> bool {
        !matches!(self, Self::NoActivePins)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => formatter.write_str("OK"),
            Self::Error => formatter.write_str("ERROR"),
            Self::Value(value) => formatter.write_str(value),
            Self::NoActivePins => formatter.write_str("NO_ACTIVE_GPIOS"),
        }
    }
}

/// Runs `command` against `registry`.
///
/// `ErrorQuery` is owned by the dispatcher and is answered with an empty
/// value here.
pub(crate) fn run(
    command: Command,
    registry: &PinRegistry,
    params: Option<&str>,
) -> Result<Reply, ScpiError> {
    match command {
        Command::Identify => Ok(Reply::Value(IDENTITY.to_owned())),
        Command::Reset => reset(registry),
        Command::ErrorQuery => Ok(Reply::Value(String::new())),
        Command::List => Ok(list(registry.table())),
        Command::Setup => setup(registry, params),
        Command::Write => write(registry, params),
        Command::Read => read(registry, params),
        Command::Toggle => toggle(registry, params),
        Command::Status => status(registry),
    }
}

fn reset(registry: &PinRegistry) -> Result<Reply, ScpiError> {
    registry
        .reset_all()
        .map(|_| Reply::Ok)
        .map_err(|source| ScpiError::Reset { source })
}

fn list(table: &PinTable) -> Reply {
    let pins: Vec<String> = table.iter().map(ToString::to_string).collect();
    Reply::Value(pins.join(","))
}

fn setup(registry: &PinRegistry, params: Option<&str>) -> Result<Reply, ScpiError> {
    let [pin, direction] = pair(Command::Setup, params)?;
    let pin = parse_pin(registry.table(), pin)?;
    let direction: Direction = direction
        .parse()
        .map_err(|_| ScpiError::InvalidDirection)?;
    match registry.setup(pin, direction) {
        Ok(()) => Ok(Reply::Ok),
        Err(RegistryError::Driver { pin, source }) => Err(ScpiError::SetupFailed { pin, source }),
        Err(source) => Err(ScpiError::Setup { source }),
    }
}

fn write(registry: &PinRegistry, params: Option<&str>) -> Result<Reply, ScpiError> {
    let [pin, value] = pair(Command::Write, params)?;
    let pin = parse_pin(registry.table(), pin)?;
    ensure_initialized(registry, pin, |source| ScpiError::Write { source })?;
    let value = parse_level(value).ok_or(ScpiError::InvalidValue)?;
    registry
        .write(pin, value)
        .map(|()| Reply::Ok)
        .map_err(|source| classify(source, |source| ScpiError::Write { source }))
}

fn read(registry: &PinRegistry, params: Option<&str>) -> Result<Reply, ScpiError> {
    let pin = parse_pin(registry.table(), single(Command::Read, params)?)?;
    registry
        .read(pin)
        .map(level_reply)
        .map_err(|source| classify(source, |source| ScpiError::Read { source }))
}

fn toggle(registry: &PinRegistry, params: Option<&str>) -> Result<Reply, ScpiError> {
    let pin = parse_pin(registry.table(), single(Command::Toggle, params)?)?;
    registry
        .toggle(pin)
        .map(level_reply)
        .map_err(|source| classify(source, |source| ScpiError::Toggle { source }))
}

fn status(registry: &PinRegistry) -> Result<Reply, ScpiError> {
    let statuses = registry
        .status()
        .map_err(|source| ScpiError::Status { source })?;
    if statuses.is_empty() {
        return Ok(Reply::NoActivePins);
    }
    let entries: Vec<String> = statuses
        .iter()
        .map(|status| match status.level {
            Ok(level) => format!("{}:{}", status.pin, u8::from(level)),
            Err(_) => format!("{}:ERROR", status.pin),
        })
        .collect();
    Ok(Reply::Value(entries.join(",")))
}

fn level_reply(level: bool) -> Reply {
    Reply::Value(if level { "1" } else { "0" }.to_owned())
}

fn pair(command: Command, params: Option<&str>) -> Result<[&str; 2], ScpiError> {
    let invalid = || ScpiError::InvalidParameters {
        usage: command.usage(),
    };
    let params = params.filter(|params| !params.is_empty()).ok_or_else(invalid)?;
    let mut parts = params.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), None) => Ok([first, second]),
        _ => Err(invalid()),
    }
}

fn single(command: Command, params: Option<&str>) -> Result<&str, ScpiError> {
    params
        .filter(|params| !params.trim().is_empty())
        .ok_or(ScpiError::InvalidParameters {
            usage: command.usage(),
        })
}

fn parse_pin(table: &PinTable, text: &str) -> Result<PinId, ScpiError> {
    let pin: i64 = text
        .trim()
        .parse()
        .map_err(|_| ScpiError::InvalidPinNumber)?;
    PinId::try_from(pin)
        .ok()
        .filter(|id| table.contains(*id))
        .ok_or(ScpiError::InvalidPin { pin })
}

fn parse_level(text: &str) -> Option<bool> {
    match text.trim().to_ascii_uppercase().as_str() {
        "1" | "ON" | "HIGH" | "TRUE" => Some(true),
        "0" | "OFF" | "LOW" | "FALSE" => Some(false),
        _ => None,
    }
}

// Reports an uninitialised pin before the value literal is looked at.
fn ensure_initialized(
    registry: &PinRegistry,
    pin: PinId,
    wrap: impl FnOnce(RegistryError) -> ScpiError,
) -> Result<(), ScpiError> {
    match registry.direction(pin) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ScpiError::NotInitialized { pin }),
        Err(source) => Err(wrap(source)),
    }
}

fn classify(error: RegistryError, wrap: impl FnOnce(RegistryError) -> ScpiError) -> ScpiError {
    match error {
        RegistryError::NotInitialized { pin } => ScpiError::NotInitialized { pin },
        RegistryError::UnknownPin { pin } => ScpiError::InvalidPin {
            pin: i64::from(pin),
        },
        other => wrap(other),
    }
}
