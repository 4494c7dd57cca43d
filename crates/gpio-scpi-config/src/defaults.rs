use crate::driver::DriverKind;
use crate::logging::LogFormat;
use crate::socket::ScpiEndpoint;

/// Address the SCPI listener binds to unless overridden.
pub const DEFAULT_SCPI_HOST: &str = "0.0.0.0";

/// Registered port for SCPI over raw TCP sockets.
pub const DEFAULT_SCPI_PORT: u16 = 5025;

/// Pending-connection backlog handed to `listen(2)`.
pub const DEFAULT_SCPI_BACKLOG: i32 = 5;

/// Seconds a session may stay silent before the server hangs up.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Default log filter expression used by the server.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Root of the kernel's sysfs GPIO class.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

/// Default log filter expression used by the server.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Owned bind address for the SCPI listener.
pub fn default_scpi_host() -> String {
    DEFAULT_SCPI_HOST.to_owned()
}

/// Owned sysfs root path.
pub fn default_sysfs_root() -> String {
    DEFAULT_SYSFS_ROOT.to_owned()
}

/// Default logging format for the server.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default pin driver backend.
pub fn default_pin_driver() -> DriverKind {
    DriverKind::Sysfs
}

/// Endpoint the SCPI listener uses when nothing is configured.
pub fn default_scpi_endpoint() -> ScpiEndpoint {
    ScpiEndpoint::new(DEFAULT_SCPI_HOST, DEFAULT_SCPI_PORT)
}
