//! Shared registry owning every open pin handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::PINS_TARGET;
use super::driver::{Direction, DriverError, PinDriver, PinHandle};
use super::errors::RegistryError;
use super::table::{PinId, PinTable};

/// Result of sampling one active pin during [`PinRegistry::status`].
#[derive(Debug)]
pub struct PinStatus {
    /// Pin that was sampled.
    pub pin: PinId,
    /// Level read from the pin, or the failure for this pin alone.
    pub level: Result<bool, RegistryError>,
}

struct PinSlot {
    direction: Direction,
    handle: Mutex<Option<Box<dyn PinHandle>>>,
}

struct RegisteredPin {
    pin: PinId,
    slot: Arc<PinSlot>,
}

/// Single owner of open pin handles, shared by every session.
///
/// Membership lives behind one mutex and each handle behind its own, always
/// locked in that order. Driver I/O runs under the handle's lock only, so a
/// slow line does not stall operations on other pins, while two callers can
/// never touch the same handle at once.
pub struct PinRegistry {
    table: PinTable,
    driver: Box<dyn PinDriver>,
    pins: Mutex<Vec<RegisteredPin>>,
    // Written only while `pins` is locked.
    closed: AtomicBool,
}

impl PinRegistry {
    /// Creates an empty registry over `table`, opening lines with `driver`.
    #[must_use]
    pub fn new(table: PinTable, driver: impl PinDriver + 'static) -> Self {
        Self {
            table,
            driver: Box::new(driver),
            pins: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Pin table the registry validates against.
    #[must_use]
    pub const fn table(&self) -> &PinTable {
        &self.table
    }

    /// Opens `pin` in `direction`, closing any handle it already had.
    ///
    /// A pin that is set up again keeps its registration position. If the
    /// driver cannot open the line, the pin is left without a handle.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownPin`] for pins outside the table,
    /// [`RegistryError::Closed`] after [`PinRegistry::shutdown`], and
    /// [`RegistryError::Driver`] when the line cannot be opened.
    pub fn setup(&self, pin: PinId, direction: Direction) -> Result<(), RegistryError> {
        self.ensure_known(pin)?;
        let mut pins = self.lock_pins()?;
        if self.closed.load(Ordering::SeqCst) {
            return Err(RegistryError::Closed);
        }
        let position = pins.iter().position(|entry| entry.pin == pin);
        if let Some(entry) = position.and_then(|index| pins.get(index)) {
            close_slot(pin, &entry.slot);
        }

        match self.driver.open(pin, direction) {
            Ok(handle) => {
                let slot = Arc::new(PinSlot {
                    direction,
                    handle: Mutex::new(Some(handle)),
                });
                match position.and_then(|index| pins.get_mut(index)) {
                    Some(entry) => entry.slot = slot,
                    None => pins.push(RegisteredPin { pin, slot }),
                }
                debug!(target: PINS_TARGET, pin, %direction, "pin set up");
                Ok(())
            }
            Err(source) => {
                if let Some(index) = position {
                    pins.remove(index);
                }
                Err(RegistryError::driver(pin, source))
            }
        }
    }

    /// Drives `pin` to `value`.
    ///
    /// # Errors
    ///
    /// Fails for unknown or uninitialised pins and on driver errors.
    pub fn write(&self, pin: PinId, value: bool) -> Result<(), RegistryError> {
        self.with_handle(pin, |handle| handle.write(value))
    }

    /// Samples `pin`.
    ///
    /// # Errors
    ///
    /// Fails for unknown or uninitialised pins and on driver errors.
    pub fn read(&self, pin: PinId) -> Result<bool, RegistryError> {
        self.with_handle(pin, |handle| handle.read())
    }

    /// Inverts `pin` and returns the new level.
    ///
    /// The read and the write happen under the pin's lock, so concurrent
    /// toggles on the same pin never observe the same starting level.
    ///
    /// # Errors
    ///
    /// Fails for unknown or uninitialised pins and on driver errors.
    pub fn toggle(&self, pin: PinId) -> Result<bool, RegistryError> {
        self.with_handle(pin, |handle| {
            let next = !handle.read()?;
            handle.write(next)?;
            Ok(next)
        })
    }

    /// Samples every active pin in registration order.
    ///
    /// A failure on one pin is reported inline and does not stop the scan.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LockPoisoned`] when membership cannot be read.
    pub fn status(&self) -> Result<Vec<PinStatus>, RegistryError> {
        let slots = self.snapshot()?;
        let mut statuses = Vec::with_capacity(slots.len());
        for (pin, slot) in slots {
            let Ok(mut guard) = slot.handle.lock() else {
                statuses.push(PinStatus {
                    pin,
                    level: Err(RegistryError::LockPoisoned),
                });
                continue;
            };
            // Closed by a concurrent reset or re-setup after the snapshot.
            let Some(handle) = guard.as_deref_mut() else {
                continue;
            };
            statuses.push(PinStatus {
                pin,
                level: handle
                    .read()
                    .map_err(|source| RegistryError::driver(pin, source)),
            });
        }
        Ok(statuses)
    }

    /// Closes every handle and empties the registry, returning how many pins
    /// were released. Close failures are logged and do not stop the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LockPoisoned`] when membership cannot be read.
    pub fn reset_all(&self) -> Result<usize, RegistryError> {
        let drained: Vec<RegisteredPin> = self.lock_pins()?.drain(..).collect();
        Ok(release(drained))
    }

    /// Releases every pin like [`PinRegistry::reset_all`] and refuses any
    /// later [`PinRegistry::setup`], so sessions outliving the server cannot
    /// reopen lines.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LockPoisoned`] when membership cannot be read.
    pub fn shutdown(&self) -> Result<usize, RegistryError> {
        let drained: Vec<RegisteredPin> = {
            let mut pins = self.lock_pins()?;
            self.closed.store(true, Ordering::SeqCst);
            pins.drain(..).collect()
        };
        Ok(release(drained))
    }

    /// Direction `pin` was set up with, if it is active.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LockPoisoned`] when membership cannot be read.
    pub fn direction(&self, pin: PinId) -> Result<Option<Direction>, RegistryError> {
        Ok(self
            .lock_pins()?
            .iter()
            .find(|entry| entry.pin == pin)
            .map(|entry| entry.slot.direction))
    }

    /// Active pins in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LockPoisoned`] when membership cannot be read.
    pub fn active_pins(&self) -> Result<Vec<PinId>, RegistryError> {
        Ok(self.lock_pins()?.iter().map(|entry| entry.pin).collect())
    }

    fn ensure_known(&self, pin: PinId) -> Result<(), RegistryError> {
        if self.table.contains(pin) {
            Ok(())
        } else {
            Err(RegistryError::UnknownPin { pin })
        }
    }

    fn lock_pins(&self) -> Result<MutexGuard<'_, Vec<RegisteredPin>>, RegistryError> {
        self.pins.lock().map_err(|_| RegistryError::LockPoisoned)
    }

    fn snapshot(&self) -> Result<Vec<(PinId, Arc<PinSlot>)>, RegistryError> {
        Ok(self
            .lock_pins()?
            .iter()
            .map(|entry| (entry.pin, Arc::clone(&entry.slot)))
            .collect())
    }

    fn current_slot(&self, pin: PinId) -> Result<Option<Arc<PinSlot>>, RegistryError> {
        Ok(self
            .lock_pins()?
            .iter()
            .find(|entry| entry.pin == pin)
            .map(|entry| Arc::clone(&entry.slot)))
    }

    fn with_handle<T>(
        &self,
        pin: PinId,
        operation: impl FnOnce(&mut dyn PinHandle) -> Result<T, DriverError>,
    ) -> Result<T, RegistryError> {
        self.ensure_known(pin)?;
        let mut slot = self
            .current_slot(pin)?
            .ok_or(RegistryError::NotInitialized { pin })?;
        loop {
            let mut guard = slot
                .handle
                .lock()
                .map_err(|_| RegistryError::LockPoisoned)?;
            if let Some(handle) = guard.as_deref_mut() {
                return operation(handle).map_err(|source| RegistryError::driver(pin, source));
            }
            drop(guard);
            // A concurrent re-setup swaps in a fresh slot after closing this one.
            match self.current_slot(pin)? {
                Some(current) if !Arc::ptr_eq(&current, &slot) => slot = current,
                _ => return Err(RegistryError::NotInitialized { pin }),
            }
        }
    }
}

impl Drop for PinRegistry {
    fn drop(&mut self) {
        let pins = self.pins.get_mut().unwrap_or_else(PoisonError::into_inner);
        let drained: Vec<RegisteredPin> = pins.drain(..).collect();
        if !drained.is_empty() {
            let released = release(drained);
            debug!(target: PINS_TARGET, released, "released pins on drop");
        }
    }
}

fn release(pins: Vec<RegisteredPin>) -> usize {
    let count = pins.len();
    for entry in pins {
        close_slot(entry.pin, &entry.slot);
    }
    count
}

// Closing must still happen after a panic poisoned the slot.
fn close_slot(pin: PinId, slot: &PinSlot) {
    let mut guard = slot.handle.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(mut handle) = guard.take() {
        if let Err(error) = handle.close() {
            warn!(target: PINS_TARGET, pin, %error, "failed to close pin handle");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::pins::{SimulatedDriver, SimulatedFault};

    struct Fixture {
        driver: SimulatedDriver,
        registry: PinRegistry,
    }

    #[fixture]
    fn harness() -> Fixture {
        let driver = SimulatedDriver::new();
        let registry = PinRegistry::new(PinTable::luckfox(), driver.clone());
        Fixture { driver, registry }
    }

    #[rstest]
    fn unknown_pins_never_reach_the_driver(harness: Fixture) {
        let Fixture { driver, registry } = harness;

        assert!(matches!(
            registry.setup(99, Direction::Out),
            Err(RegistryError::UnknownPin { pin: 99 })
        ));
        assert!(matches!(registry.write(99, true), Err(RegistryError::UnknownPin { .. })));
        assert!(matches!(registry.read(99), Err(RegistryError::UnknownPin { .. })));
        assert!(matches!(registry.toggle(99), Err(RegistryError::UnknownPin { .. })));
        assert_eq!(driver.opens(99), 0);
        assert!(registry.active_pins().expect("pins").is_empty());
    }

    #[rstest]
    fn uninitialised_pins_are_rejected(harness: Fixture) {
        assert!(matches!(
            harness.registry.read(54),
            Err(RegistryError::NotInitialized { pin: 54 })
        ));
    }

    #[rstest]
    fn repeated_setup_closes_the_previous_handle_once(harness: Fixture) {
        let Fixture { driver, registry } = harness;
        registry.setup(54, Direction::Out).expect("first setup");
        registry.setup(55, Direction::Out).expect("other pin");
        registry.setup(54, Direction::In).expect("second setup");

        assert_eq!(driver.opens(54), 2);
        assert_eq!(driver.closes(54), 1);
        assert_eq!(driver.live_handles(54), 1);
        assert_eq!(registry.active_pins().expect("pins"), vec![54, 55]);
        assert_eq!(registry.direction(54).expect("direction"), Some(Direction::In));
    }

    #[rstest]
    fn failed_reopen_leaves_no_handle(harness: Fixture) {
        let Fixture { driver, registry } = harness;
        registry.setup(54, Direction::Out).expect("setup");
        driver.inject_fault(54, SimulatedFault::Open);

        assert!(matches!(
            registry.setup(54, Direction::Out),
            Err(RegistryError::Driver { pin: 54, .. })
        ));
        assert_eq!(driver.live_handles(54), 0);
        assert!(matches!(
            registry.read(54),
            Err(RegistryError::NotInitialized { pin: 54 })
        ));
    }

    #[rstest]
    fn toggle_twice_restores_the_level(harness: Fixture) {
        let Fixture { registry, .. } = harness;
        registry.setup(54, Direction::Out).expect("setup");
        registry.write(54, true).expect("write");

        assert!(!registry.toggle(54).expect("first toggle"));
        assert!(registry.toggle(54).expect("second toggle"));
        assert!(registry.read(54).expect("read"));
    }

    #[rstest]
    fn status_follows_registration_order(harness: Fixture) {
        let Fixture { registry, .. } = harness;
        assert!(registry.status().expect("empty status").is_empty());

        registry.setup(55, Direction::Out).expect("setup 55");
        registry.setup(54, Direction::Out).expect("setup 54");
        registry.write(54, true).expect("write");

        let levels: Vec<(PinId, bool)> = registry
            .status()
            .expect("status")
            .into_iter()
            .map(|status| (status.pin, status.level.expect("level")))
            .collect();
        assert_eq!(levels, vec![(55, false), (54, true)]);
    }

    #[rstest]
    fn status_isolates_a_failing_pin(harness: Fixture) {
        let Fixture { driver, registry } = harness;
        registry.setup(54, Direction::Out).expect("setup 54");
        registry.setup(55, Direction::Out).expect("setup 55");
        driver.inject_fault(54, SimulatedFault::Read);

        let statuses = registry.status().expect("status");

        assert!(statuses[0].level.is_err());
        assert!(!statuses[1].level.as_ref().copied().expect("55 readable"));
    }

    #[rstest]
    fn reset_all_closes_everything_once(harness: Fixture) {
        let Fixture { driver, registry } = harness;
        registry.setup(54, Direction::Out).expect("setup 54");
        registry.setup(55, Direction::Out).expect("setup 55");
        driver.inject_fault(55, SimulatedFault::Close);

        assert_eq!(registry.reset_all().expect("reset"), 2);
        assert_eq!(registry.reset_all().expect("second reset"), 0);
        assert_eq!(driver.closes(54), 1);
        assert_eq!(driver.closes(55), 1);
        assert!(matches!(
            registry.toggle(54),
            Err(RegistryError::NotInitialized { pin: 54 })
        ));
    }

    #[rstest]
    fn writes_racing_a_re_setup_never_see_an_uninitialised_pin(harness: Fixture) {
        let Fixture { registry, .. } = harness;
        registry.setup(54, Direction::Out).expect("setup");
        let done = AtomicBool::new(false);

        let spurious = thread::scope(|scope| {
            let writer = scope.spawn(|| {
                let mut spurious = 0_usize;
                while !done.load(Ordering::SeqCst) {
                    match registry.write(54, true) {
                        Ok(()) => {}
                        Err(RegistryError::NotInitialized { .. }) => spurious += 1,
                        Err(error) => panic!("unexpected write failure: {error}"),
                    }
                }
                spurious
            });
            for _ in 0..2_000 {
                registry.setup(54, Direction::Out).expect("re-setup");
            }
            done.store(true, Ordering::SeqCst);
            writer.join().expect("writer panicked")
        });

        assert_eq!(spurious, 0);
    }

    #[rstest]
    fn shutdown_refuses_later_setups(harness: Fixture) {
        let Fixture { driver, registry } = harness;
        registry.setup(54, Direction::Out).expect("setup");

        assert_eq!(registry.shutdown().expect("shutdown"), 1);
        assert!(matches!(
            registry.setup(55, Direction::Out),
            Err(RegistryError::Closed)
        ));
        assert_eq!(driver.opens(55), 0);
        assert_eq!(driver.live_handles(54), 0);
        assert!(registry.active_pins().expect("pins").is_empty());
    }

    #[rstest]
    fn dropping_the_registry_closes_handles(harness: Fixture) {
        let Fixture { driver, registry } = harness;
        registry.setup(54, Direction::Out).expect("setup");
        drop(registry);
        assert_eq!(driver.live_handles(54), 0);
    }

    #[rstest]
    #[case::even(40)]
    #[case::odd(41)]
    fn concurrent_toggles_are_not_lost(harness: Fixture, #[case] toggles: usize) {
        let Fixture { driver, registry } = harness;
        registry.setup(54, Direction::Out).expect("setup");
        let registry = Arc::new(registry);

        thread::scope(|scope| {
            for _ in 0..toggles {
                let registry = Arc::clone(&registry);
                scope.spawn(move || registry.toggle(54).expect("toggle"));
            }
        });

        assert_eq!(driver.level(54), toggles % 2 == 1);
        assert_eq!(registry.read(54).expect("read"), toggles % 2 == 1);
    }
}
