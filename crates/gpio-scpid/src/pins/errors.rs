//! Error types reported by the pin registry.

use thiserror::Error;

use super::driver::DriverError;
use super::table::PinId;

/// Failures surfaced by [`super::PinRegistry`] operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The pin is not part of the pin table.
    #[error("GPIO {pin} is not in the pin table")]
    UnknownPin {
        /// Requested pin.
        pin: PinId,
    },
    /// The pin has no open handle.
    #[error("GPIO {pin} not initialized")]
    NotInitialized {
        /// Requested pin.
        pin: PinId,
    },
    /// The driver failed while operating on the pin.
    #[error("driver failure on GPIO {pin}: {source}")]
    Driver {
        /// Pin the driver was operating on.
        pin: PinId,
        /// Underlying driver failure.
        #[source]
        source: DriverError,
    },
    /// A thread panicked while holding one of the registry locks.
    #[error("pin registry lock poisoned")]
    LockPoisoned,
    /// The registry was shut down and accepts no new handles.
    #[error("pin registry is shut down")]
    Closed,
}

impl RegistryError {
    /// Wraps a driver failure for `pin`.
    #[must_use]
    pub const fn driver(pin: PinId, source: DriverError) -> Self {
        Self::Driver { pin, source }
    }

    /// Pin the error relates to, when there is one.
    #[must_use]
    pub const fn pin(&self) -> Option<PinId> {
        match self {
            Self::UnknownPin { pin } | Self::NotInitialized { pin } | Self::Driver { pin, .. } => {
                Some(*pin)
            }
            Self::LockPoisoned | Self::Closed => None,
        }
    }
}
