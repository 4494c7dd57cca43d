//! Linux sysfs GPIO driver (`/sys/class/gpio`).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::PINS_TARGET;
use super::driver::{Direction, DriverError, PinDriver, PinHandle};
use super::table::PinId;

const READY_TIMEOUT: Duration = Duration::from_secs(1);
const READY_POLL: Duration = Duration::from_millis(10);

/// Drives lines through the sysfs GPIO attribute files.
#[derive(Debug, Clone)]
pub struct SysfsDriver {
    root: PathBuf,
    ready_timeout: Duration,
}

impl SysfsDriver {
    /// Creates a driver rooted at `root`, normally `/sys/class/gpio`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ready_timeout: READY_TIMEOUT,
        }
    }

    /// Overrides how long to wait for a freshly exported line to appear.
    #[must_use]
    pub const fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }

    /// Root of the sysfs GPIO tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn line_dir(&self, pin: PinId) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    fn export(&self, pin: PinId) -> Result<(), DriverError> {
        if self.line_dir(pin).exists() {
            return Ok(());
        }
        debug!(target: PINS_TARGET, pin, "exporting GPIO line");
        let mut export = OpenOptions::new()
            .write(true)
            .open(self.root.join("export"))
            .map_err(|source| DriverError::io(pin, "export", source))?;
        export
            .write_all(pin.to_string().as_bytes())
            .map_err(|source| DriverError::io(pin, "export", source))
    }

    // udev may still be fixing permissions right after export.
    fn open_direction(&self, pin: PinId) -> Result<File, DriverError> {
        let path = self.line_dir(pin).join("direction");
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            match OpenOptions::new().write(true).open(&path) {
                Ok(file) => return Ok(file),
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                    ) =>
                {
                    if Instant::now() >= deadline {
                        return Err(DriverError::NotReady {
                            pin,
                            waited_ms: u64::try_from(self.ready_timeout.as_millis())
                                .unwrap_or(u64::MAX),
                        });
                    }
                    thread::sleep(READY_POLL);
                }
                Err(source) => return Err(DriverError::io(pin, "configure", source)),
            }
        }
    }
}

impl PinDriver for SysfsDriver {
    fn open(&self, pin: PinId, direction: Direction) -> Result<Box<dyn PinHandle>, DriverError> {
        self.export(pin)?;
        let mut direction_file = self.open_direction(pin)?;
        direction_file
            .write_all(direction.as_str().as_bytes())
            .map_err(|source| DriverError::io(pin, "configure", source))?;

        let value = OpenOptions::new()
            .read(true)
            .write(direction == Direction::Out)
            .open(self.line_dir(pin).join("value"))
            .map_err(|source| DriverError::io(pin, "open", source))?;
        debug!(target: PINS_TARGET, pin, %direction, "opened sysfs GPIO line");
        Ok(Box::new(SysfsHandle {
            pin,
            value: Some(value),
        }))
    }
}

struct SysfsHandle {
    pin: PinId,
    value: Option<File>,
}

impl SysfsHandle {
    fn file(&mut self) -> Result<&mut File, DriverError> {
        self.value
            .as_mut()
            .ok_or_else(|| DriverError::rejected(self.pin, "handle already closed"))
    }
}

impl PinHandle for SysfsHandle {
    fn read(&mut self) -> Result<bool, DriverError> {
        let pin = self.pin;
        let file = self.file()?;
        file.seek(SeekFrom::Start(0))
            .map_err(|source| DriverError::io(pin, "read", source))?;
        let mut buf = [0_u8; 1];
        let read = file
            .read(&mut buf)
            .map_err(|source| DriverError::io(pin, "read", source))?;
        let [byte] = buf;
        match (read, byte) {
            (1, b'1') => Ok(true),
            (1, b'0') => Ok(false),
            (0, _) => Err(DriverError::UnexpectedValue {
                pin,
                value: String::new(),
            }),
            (_, other) => Err(DriverError::UnexpectedValue {
                pin,
                value: char::from(other).to_string(),
            }),
        }
    }

    fn write(&mut self, value: bool) -> Result<(), DriverError> {
        let pin = self.pin;
        let file = self.file()?;
        file.seek(SeekFrom::Start(0))
            .map_err(|source| DriverError::io(pin, "write", source))?;
        file.write_all(if value { b"1" } else { b"0" })
            .map_err(|source| DriverError::io(pin, "write", source))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        // The line stays exported; only the value descriptor is released.
        self.value.take();
        Ok(())
    }
}
