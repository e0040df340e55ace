//! Terminal handling for interactive container sessions.
//!
//! This module owns the local terminal's mode. Raw mode is entered through
//! [`Terminal::set_raw`], which hands back a [`RawModeGuard`] that restores the
//! original mode when it goes out of scope, on every exit path.

use crate::error::{Error, Result};
use crossterm::terminal;
use serde::{Deserialize, Serialize};
use std::io::{self, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Terminal size in rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalGeometry {
    /// Height in rows.
    pub rows: u16,
    /// Width in columns.
    pub columns: u16,
}

impl TerminalGeometry {
    /// Creates a geometry from a reported size.
    ///
    /// A zero dimension means the size is unknown, not that the terminal is
    /// empty, so it is reported as [`Error::GeometryUnavailable`].
    pub fn new(rows: u16, columns: u16) -> Result<Self> {
        if rows == 0 || columns == 0 {
            return Err(Error::GeometryUnavailable);
        }
        Ok(Self { rows, columns })
    }
}

/// Low-level access to a terminal device.
pub trait TerminalDevice: Send + Sync {
    /// Disables line buffering, echo and signal generation.
    fn enable_raw_mode(&self) -> io::Result<()>;

    /// Returns the device to its original mode.
    fn disable_raw_mode(&self) -> io::Result<()>;

    /// Returns `(rows, columns)`.
    fn size(&self) -> io::Result<(u16, u16)>;
}

/// The process's controlling terminal, driven through crossterm.
#[derive(Debug, Default)]
pub struct CrosstermDevice;

impl TerminalDevice for CrosstermDevice {
    fn enable_raw_mode(&self) -> io::Result<()> {
        terminal::enable_raw_mode()
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        terminal::disable_raw_mode()
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        let (cols, rows) = terminal::size()?;
        Ok((rows, cols))
    }
}

/// Local terminal controller.
///
/// Tracks whether raw mode is active so that restoration is idempotent and
/// only one owner can hold raw mode at a time.
pub struct Terminal {
    device: Box<dyn TerminalDevice>,
    raw: AtomicBool,
}

impl Terminal {
    /// Acquires the local interactive terminal.
    ///
    /// Fails with [`Error::TerminalUnavailable`] when standard input is not a
    /// terminal (piped or redirected from a file).
    pub fn open() -> Result<Arc<Self>> {
        if !io::stdin().is_terminal() {
            return Err(Error::TerminalUnavailable);
        }
        Ok(Arc::new(Self::with_device(CrosstermDevice)))
    }

    /// Wraps an arbitrary terminal device.
    pub fn with_device(device: impl TerminalDevice + 'static) -> Self {
        Self {
            device: Box::new(device),
            raw: AtomicBool::new(false),
        }
    }

    /// Switches the terminal to raw mode.
    ///
    /// The returned guard restores the original mode when dropped.
    pub fn set_raw(self: &Arc<Self>) -> Result<RawModeGuard> {
        if self.raw.swap(true, Ordering::SeqCst) {
            return Err(Error::TerminalMode(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "terminal is already in raw mode",
            )));
        }

        if let Err(e) = self.device.enable_raw_mode() {
            self.raw.store(false, Ordering::SeqCst);
            return Err(Error::TerminalMode(e));
        }

        tracing::debug!("terminal switched to raw mode");
        Ok(RawModeGuard {
            terminal: Arc::clone(self),
        })
    }

    /// Reverts to the original mode. Does nothing if raw mode is not active.
    pub fn restore(&self) -> Result<()> {
        if self.raw.swap(false, Ordering::SeqCst) {
            self.device.disable_raw_mode().map_err(Error::TerminalMode)?;
            tracing::debug!("terminal mode restored");
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn is_raw(&self) -> bool {
        self.raw.load(Ordering::SeqCst)
    }

    /// Queries the current terminal size.
    pub fn current_geometry(&self) -> Result<TerminalGeometry> {
        let (rows, columns) = self
            .device
            .size()
            .map_err(|_| Error::GeometryUnavailable)?;
        TerminalGeometry::new(rows, columns)
    }
}

/// RAII guard that restores terminal mode on drop.
#[must_use = "dropping the guard immediately restores the terminal"]
pub struct RawModeGuard {
    terminal: Arc<Terminal>,
}

impl RawModeGuard {
    /// Restores the terminal now, reporting any failure.
    pub fn restore(self) -> Result<()> {
        self.terminal.restore()
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.restore() {
            tracing::warn!("failed to restore terminal: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeDevice;

    #[test]
    fn test_zero_geometry_is_unavailable() {
        assert!(TerminalGeometry::new(0, 80).is_err());
        assert!(TerminalGeometry::new(24, 0).is_err());
        assert_eq!(
            TerminalGeometry::new(24, 80).unwrap(),
            TerminalGeometry {
                rows: 24,
                columns: 80
            }
        );
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let device = FakeDevice::new();
        let terminal = Arc::new(Terminal::with_device(device.clone()));

        {
            let _guard = terminal.set_raw().unwrap();
            assert!(terminal.is_raw());
            assert_eq!(device.raw_entries(), 1);
        }

        assert!(!terminal.is_raw());
        assert_eq!(device.restores(), 1);
    }

    #[test]
    fn test_explicit_restore_is_not_repeated_by_drop() {
        let device = FakeDevice::new();
        let terminal = Arc::new(Terminal::with_device(device.clone()));

        let guard = terminal.set_raw().unwrap();
        guard.restore().unwrap();
        terminal.restore().unwrap();

        assert_eq!(device.restores(), 1);
    }

    #[test]
    fn test_raw_mode_is_exclusive() {
        let device = FakeDevice::new();
        let terminal = Arc::new(Terminal::with_device(device.clone()));

        let _guard = terminal.set_raw().unwrap();
        assert!(matches!(terminal.set_raw(), Err(Error::TerminalMode(_))));
        assert_eq!(device.raw_entries(), 1);
    }

    #[test]
    fn test_rejected_mode_change() {
        let device = FakeDevice::new().rejecting_raw_mode();
        let terminal = Arc::new(Terminal::with_device(device.clone()));

        assert!(matches!(terminal.set_raw(), Err(Error::TerminalMode(_))));
        assert!(!terminal.is_raw());
        terminal.restore().unwrap();
        assert_eq!(device.restores(), 0);
    }

    #[test]
    fn test_current_geometry() {
        let device = FakeDevice::new().with_size(40, 120);
        let terminal = Terminal::with_device(device.clone());
        assert_eq!(
            terminal.current_geometry().unwrap(),
            TerminalGeometry {
                rows: 40,
                columns: 120
            }
        );

        device.set_size(None);
        assert!(matches!(
            terminal.current_geometry(),
            Err(Error::GeometryUnavailable)
        ));
    }
}
