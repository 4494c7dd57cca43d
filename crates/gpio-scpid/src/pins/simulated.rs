//! In-memory pin driver for hosts without GPIO hardware.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::driver::{Direction, DriverError, PinDriver, PinHandle};
use super::table::PinId;

/// Driver operation that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedFault {
    /// `open` fails.
    Open,
    /// `read` fails.
    Read,
    /// `write` fails.
    Write,
    /// `close` fails.
    Close,
}

impl SimulatedFault {
    const fn action(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
            Self::Close => "close",
        }
    }
}

#[derive(Debug, Default)]
struct Line {
    level: bool,
    opens: usize,
    closes: usize,
}

#[derive(Debug, Default)]
struct State {
    lines: HashMap<PinId, Line>,
    faults: HashSet<(PinId, SimulatedFault)>,
}

impl State {
    fn line(&mut self, pin: PinId) -> &mut Line {
        self.lines.entry(pin).or_default()
    }

    fn check(&self, pin: PinId, fault: SimulatedFault) -> Result<(), DriverError> {
        if self.faults.contains(&(pin, fault)) {
            return Err(DriverError::rejected(
                pin,
                format!("simulated {} failure", fault.action()),
            ));
        }
        Ok(())
    }
}

/// Pin driver backed by shared in-memory levels.
///
/// Clones share state, so a test can keep one clone to inspect levels and
/// open/close counts while the registry owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDriver {
    state: Arc<Mutex<State>>,
}

impl SimulatedDriver {
    /// Creates a driver with every line low and no faults armed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Current level of `pin`.
    #[must_use]
    pub fn level(&self, pin: PinId) -> bool {
        self.state().lines.get(&pin).is_some_and(|line| line.level)
    }

    /// Forces the level of `pin`, as an external circuit would.
    pub fn set_level(&self, pin: PinId, level: bool) {
        self.state().line(pin).level = level;
    }

    /// Number of successful `open` calls for `pin`.
    #[must_use]
    pub fn opens(&self, pin: PinId) -> usize {
        self.state().lines.get(&pin).map_or(0, |line| line.opens)
    }

    /// Number of `close` calls for `pin`.
    #[must_use]
    pub fn closes(&self, pin: PinId) -> usize {
        self.state().lines.get(&pin).map_or(0, |line| line.closes)
    }

    /// Handles for `pin` that were opened and not yet closed.
    #[must_use]
    pub fn live_handles(&self, pin: PinId) -> usize {
        self.state()
            .lines
            .get(&pin)
            .map_or(0, |line| line.opens.saturating_sub(line.closes))
    }

    /// Arms `fault` for `pin` until [`Self::clear_fault`] is called.
    pub fn inject_fault(&self, pin: PinId, fault: SimulatedFault) {
        self.state().faults.insert((pin, fault));
    }

    /// Disarms `fault` for `pin`.
    pub fn clear_fault(&self, pin: PinId, fault: SimulatedFault) {
        self.state().faults.remove(&(pin, fault));
    }
}

impl PinDriver for SimulatedDriver {
    fn open(&self, pin: PinId, direction: Direction) -> Result<Box<dyn PinHandle>, DriverError> {
        let mut state = self.state();
        state.check(pin, SimulatedFault::Open)?;
        state.line(pin).opens += 1;
        Ok(Box::new(SimulatedHandle {
            pin,
            direction,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct SimulatedHandle {
    pin: PinId,
    direction: Direction,
    state: Arc<Mutex<State>>,
    closed: bool,
}

impl SimulatedHandle {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::rejected(self.pin, "handle already closed"));
        }
        Ok(())
    }
}

impl PinHandle for SimulatedHandle {
    fn read(&mut self) -> Result<bool, DriverError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.check(self.pin, SimulatedFault::Read)?;
        Ok(state.line(self.pin).level)
    }

    fn write(&mut self, value: bool) -> Result<(), DriverError> {
        self.ensure_open()?;
        if self.direction == Direction::In {
            return Err(DriverError::rejected(self.pin, "line is configured as input"));
        }
        let mut state = lock(&self.state);
        state.check(self.pin, SimulatedFault::Write)?;
        state.line(self.pin).level = value;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut state = lock(&self.state);
        state.line(self.pin).closes += 1;
        state.check(self.pin, SimulatedFault::Close)
    }
}

// Simulated state stays usable even if a test thread panicked mid-update.
fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
