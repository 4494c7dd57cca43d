//! SCPI command server for the GPIO lines of a LuckFox Pico board.
//!
//! The server accepts newline-terminated SCPI commands over TCP and applies
//! them to a shared [`pins::PinRegistry`]. Each connection runs on its own
//! thread with a private error register, while pin state is shared by every
//! session. See [`scpi`] for the command set and reply format.
//!
//! Startup follows a fixed order: configuration is loaded and telemetry is
//! installed by [`bootstrap_with`], the SCPI port is bound, every pin in the
//! board table is set up as an output, and only then does the listener begin
//! accepting clients. On `SIGINT`, `SIGTERM`, `SIGQUIT`, or `SIGHUP` the
//! listener stops and all pins are released before [`run_server`] returns.
//!
//! Pins are driven through the [`pins::PinDriver`] trait. The sysfs driver
//! talks to `/sys/class/gpio`; the simulated driver keeps levels in memory
//! and is selected with `--pin-driver simulated` for development hosts.

mod bootstrap;
mod health;
pub mod pins;
mod process;
pub mod scpi;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Server, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_server};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
