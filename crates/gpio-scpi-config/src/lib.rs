//! Shared configuration for the GPIO SCPI server.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then a
//! configuration file, then `GPIO_SCPI_*` environment variables, then command
//! line flags. The resolved [`Config`] is read-only once loaded; the server
//! never writes configuration back.

mod defaults;
mod driver;
mod logging;
mod socket;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_SCPI_BACKLOG, DEFAULT_SCPI_HOST,
    DEFAULT_SCPI_PORT, DEFAULT_SYSFS_ROOT, default_log_filter, default_log_filter_string,
    default_log_format, default_pin_driver, default_scpi_endpoint, default_scpi_host,
    default_sysfs_root,
};
pub use driver::{DriverKind, DriverKindParseError};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{EndpointParseError, ScpiEndpoint};

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "GPIO_SCPI")]
pub struct Config {
    /// Address the SCPI listener binds to.
    #[ortho_config(default = default_scpi_host())]
    pub scpi_host: String,
    /// TCP port of the SCPI listener.
    #[ortho_config(default = DEFAULT_SCPI_PORT)]
    pub scpi_port: u16,
    /// Pending-connection backlog for the listening socket.
    #[ortho_config(default = DEFAULT_SCPI_BACKLOG)]
    pub scpi_backlog: i32,
    /// Seconds without input before a session is closed.
    #[ortho_config(default = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Telemetry output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Backend used to drive the pins.
    #[ortho_config(default = default_pin_driver())]
    pub pin_driver: DriverKind,
    /// Root of the sysfs GPIO tree used by the sysfs driver.
    #[ortho_config(default = default_sysfs_root())]
    pub sysfs_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scpi_host: default_scpi_host(),
            scpi_port: DEFAULT_SCPI_PORT,
            scpi_backlog: DEFAULT_SCPI_BACKLOG,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            pin_driver: default_pin_driver(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer is malformed.
    pub fn load_from_process() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is the program name, as with `std::env::args_os`.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer is malformed.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Endpoint the SCPI listener binds to.
    #[must_use]
    pub fn scpi_endpoint(&self) -> ScpiEndpoint {
        ScpiEndpoint::new(self.scpi_host.clone(), self.scpi_port)
    }

    /// Listen backlog, clamped to at least one pending connection.
    #[must_use]
    pub fn scpi_backlog(&self) -> i32 {
        self.scpi_backlog.max(1)
    }

    /// Idle read timeout applied to every session.
    ///
    /// A zero value is treated as one second so a misconfiguration cannot
    /// disable the timeout entirely.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.max(1))
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured telemetry format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Configured pin driver backend.
    #[must_use]
    pub const fn pin_driver(&self) -> DriverKind {
        self.pin_driver
    }

    /// Root of the sysfs GPIO tree.
    #[must_use]
    pub fn sysfs_root(&self) -> &str {
        self.sysfs_root.as_str()
    }
}
