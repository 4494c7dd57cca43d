//! Supervises server launch sequencing and runtime orchestration.

use std::sync::Arc;
use std::time::Duration;

use nix::unistd::geteuid;
use tracing::{info, warn};

use gpio_scpi_config::{Config, DriverKind};

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::HealthReporter;
use crate::pins::{Direction, PinRegistry, PinTable, SimulatedDriver, SysfsDriver};
use crate::scpi::ScpiConnectionHandler;
use crate::transport::SocketListener;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to launch the server runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
}

/// Runs the server using the production collaborators.
///
/// # Errors
///
/// Returns a [`LaunchError`] when bootstrap fails, the SCPI port cannot be
/// bound, or signal handling cannot be installed.
pub fn run_server() -> Result<(), LaunchError> {
    let shutdown = SystemShutdownSignal::install()?;
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown,
    };
    run_server_with(plan)
}

/// Runs the server with injected collaborators.
pub(crate) fn run_server_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter,
        mut shutdown,
    } = plan;

    let config = bootstrap_with(&loader, reporter.as_ref())?.into_config();
    info!(
        target: PROCESS_TARGET,
        endpoint = %config.scpi_endpoint(),
        pin_driver = %config.pin_driver(),
        "starting SCPI server"
    );
    warn_if_unprivileged(config.pin_driver());

    let registry = Arc::new(build_registry(&config));
    let listener = SocketListener::bind(&config.scpi_endpoint(), config.scpi_backlog())?;

    let served = if setup_startup_pins(&registry, reporter.as_ref(), &mut shutdown) {
        serve(
            listener,
            &registry,
            config.idle_timeout(),
            reporter.as_ref(),
            &mut shutdown,
        )
    } else {
        info!(target: PROCESS_TARGET, "shutdown requested during pin setup");
        reporter.shutdown_started();
        drop(listener);
        Ok(())
    };

    release_pins(&registry, reporter.as_ref());
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    served
}

fn build_registry(config: &Config) -> PinRegistry {
    let table = PinTable::luckfox();
    match config.pin_driver() {
        DriverKind::Sysfs => PinRegistry::new(table, SysfsDriver::new(config.sysfs_root())),
        DriverKind::Simulated => PinRegistry::new(table, SimulatedDriver::new()),
    }
}

fn warn_if_unprivileged(driver: DriverKind) {
    if driver.is_hardware() && !geteuid().is_root() {
        warn!(
            target: PROCESS_TARGET,
            "not running as root; GPIO export may be denied"
        );
    }
}

/// Sets every table pin up as an output. Returns `false` when shutdown was
/// requested before all pins were visited.
fn setup_startup_pins<S: ShutdownSignal>(
    registry: &PinRegistry,
    reporter: &dyn HealthReporter,
    shutdown: &mut S,
) -> bool {
    for pin in registry.table().ids() {
        if shutdown.triggered() {
            return false;
        }
        match registry.setup(pin, Direction::Out) {
            Ok(()) => reporter.pin_ready(pin, Direction::Out),
            Err(error) => reporter.pin_failed(pin, &error),
        }
    }
    true
}

fn serve<S: ShutdownSignal>(
    listener: SocketListener,
    registry: &Arc<PinRegistry>,
    idle_timeout: Duration,
    reporter: &dyn HealthReporter,
    shutdown: &mut S,
) -> Result<(), LaunchError> {
    let handler = Arc::new(ScpiConnectionHandler::new(
        Arc::clone(registry),
        idle_timeout,
    ));
    let handle = listener.start(handler)?;
    reporter.listener_ready(handle.local_addr());

    let waited = shutdown.wait();
    reporter.shutdown_started();
    handle.shutdown();
    handle.join()?;
    waited?;
    Ok(())
}

// Sessions still running keep the registry alive but can no longer set pins up.
fn release_pins(registry: &PinRegistry, reporter: &dyn HealthReporter) {
    match registry.shutdown() {
        Ok(count) => reporter.pins_released(count),
        Err(error) => warn!(
            target: PROCESS_TARGET,
            error = %error,
            "failed to release pins"
        ),
    }
}
