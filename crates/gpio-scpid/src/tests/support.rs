//! Shared collaborators for the behavioural suites.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use ortho_config::OrthoError;

use gpio_scpi_config::{Config, DriverKind};

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::health::HealthReporter;
use crate::pins::{Direction, PinId, RegistryError};

/// Configuration for an in-process server on an ephemeral loopback port.
pub fn test_config() -> Config {
    Config {
        scpi_host: String::from("127.0.0.1"),
        scpi_port: 0,
        pin_driver: DriverKind::Simulated,
        ..Config::default()
    }
}

/// Loader that returns [`test_config`].
#[derive(Clone, Default)]
pub struct TestConfigLoader;

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(test_config())
    }
}

/// Loader that intentionally fails by passing an invalid CLI argument.
#[derive(Clone, Default)]
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("gpio-scpid"),
            OsString::from("--scpi-port"),
            OsString::from("not-a-port"),
        ];
        Config::load_from_args(args)
    }
}

/// Lifecycle events captured by [`RecordingHealthReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    PinReady(PinId, Direction),
    PinFailed(PinId),
    ListenerReady(SocketAddr),
    ShutdownStarted,
    PinsReleased(usize),
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Address reported by `listener_ready`, if the listener came up.
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.events().into_iter().find_map(|event| match event {
            HealthEvent::ListenerReady(addr) => Some(addr),
            _ => None,
        })
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn pin_ready(&self, pin: PinId, direction: Direction) {
        self.record(HealthEvent::PinReady(pin, direction));
    }

    fn pin_failed(&self, pin: PinId, _error: &RegistryError) {
        self.record(HealthEvent::PinFailed(pin));
    }

    fn listener_ready(&self, addr: SocketAddr) {
        self.record(HealthEvent::ListenerReady(addr));
    }

    fn shutdown_started(&self) {
        self.record(HealthEvent::ShutdownStarted);
    }

    fn pins_released(&self, count: usize) {
        self.record(HealthEvent::PinsReleased(count));
    }
}
