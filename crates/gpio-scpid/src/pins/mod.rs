//! Pin table, driver seam, and the shared registry of open handles.
//!
//! The [`PinRegistry`] is the single owner of every open [`PinHandle`]. The
//! SCPI sessions and any other in-process caller (for example an HTTP layer)
//! share one registry through an `Arc`, so hardware state has exactly one
//! source of truth.

mod driver;
mod errors;
mod registry;
mod simulated;
mod sysfs;
mod table;

pub use driver::{Direction, DirectionParseError, DriverError, PinDriver, PinHandle};
pub use errors::RegistryError;
pub use registry::{PinRegistry, PinStatus};
pub use simulated::{SimulatedDriver, SimulatedFault};
pub use sysfs::SysfsDriver;
pub use table::{PinDescriptor, PinId, PinTable};

const PINS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pins");
