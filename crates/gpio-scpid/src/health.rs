//! Structured health reporting for server lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use gpio_scpi_config::Config;

use crate::bootstrap::BootstrapError;
use crate::pins::{Direction, PinId, RegistryError};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked after a startup pin is set up.
    fn pin_ready(&self, pin: PinId, direction: Direction);

    /// Invoked when a startup pin cannot be set up.
    fn pin_failed(&self, pin: PinId, error: &RegistryError);

    /// Invoked once the SCPI listener accepts connections.
    fn listener_ready(&self, addr: SocketAddr);

    /// Invoked when shutdown begins.
    fn shutdown_started(&self);

    /// Invoked after the registry released its pins.
    fn pins_released(&self, count: usize);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn pin_ready(&self, pin: PinId, direction: Direction) {
        (**self).pin_ready(pin, direction);
    }

    fn pin_failed(&self, pin: PinId, error: &RegistryError) {
        (**self).pin_failed(pin, error);
    }

    fn listener_ready(&self, addr: SocketAddr) {
        (**self).listener_ready(addr);
    }

    fn shutdown_started(&self) {
        (**self).shutdown_started();
    }

    fn pins_released(&self, count: usize) {
        (**self).pins_released(count);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting server bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            endpoint = %config.scpi_endpoint(),
            pin_driver = %config.pin_driver(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "server bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "server bootstrap failed"
        );
    }

    fn pin_ready(&self, pin: PinId, direction: Direction) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "pin_ready",
            pin,
            %direction,
            "pin ready"
        );
    }

    fn pin_failed(&self, pin: PinId, error: &RegistryError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "pin_failed",
            pin,
            error = %error,
            "pin setup failed"
        );
    }

    fn listener_ready(&self, addr: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_ready",
            %addr,
            "SCPI listener ready"
        );
    }

    fn shutdown_started(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_started",
            "shutting down"
        );
    }

    fn pins_released(&self, count: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "pins_released",
            count,
            "pins released"
        );
    }
}
