//! Low-level serial port access
//!
//! A thin termios wrapper: opens the character device without terminal-control
//! semantics, snapshots the device's prior configuration, applies raw
//! non-canonical settings from a [`PortConfig`], and restores the snapshot on
//! close. Close runs on every exit path, explicitly or from `Drop` during
//! unwinding.

use std::ffi::CString;
use std::io;
use std::mem;

use tracing::{debug, trace, warn};

use super::channel::SerialLink;
use super::config::{PortConfig, ReadMode};
use super::signal::SigioClaim;
use super::SerialError;

/// An open serial device
pub struct Port {
    fd: Option<libc::c_int>,
    saved_tio: libc::termios,
    config: PortConfig,
    sigio: Option<SigioClaim>,
}

impl Port {
    /// Open the device described by `config`.
    ///
    /// Fails without touching the device's configuration: the prior termios
    /// snapshot is taken only after a successful open, and a failed
    /// reconfiguration closes the descriptor before returning.
    pub fn open(config: PortConfig) -> Result<Self, SerialError> {
        Self::open_with_notifier(config, None)
    }

    /// Open with a caller-supplied wake notifier for
    /// [`ReadMode::AsyncSignal`]. The notifier runs in signal context: it must
    /// only wake the main flow (set a flag, post to an eventfd), never perform
    /// buffer I/O. Ignored in the other read modes.
    pub fn open_with_notifier(
        config: PortConfig,
        notifier: Option<fn()>,
    ) -> Result<Self, SerialError> {
        let path = CString::new(config.device.as_str()).map_err(|_| SerialError::Open {
            path: config.device.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "device path contains NUL"),
        })?;

        // O_NOCTTY keeps the device from becoming our controlling terminal,
        // so no stray terminal signals reach the process through this handle.
        let mut flags = libc::O_RDWR | libc::O_NOCTTY;
        if config.read_mode.is_non_blocking() {
            flags |= libc::O_NONBLOCK;
        }

        let fd = unsafe { libc::open(path.as_ptr(), flags) };
        if fd < 0 {
            return Err(SerialError::Open {
                path: config.device.clone(),
                source: io::Error::last_os_error(),
            });
        }

        let mut saved_tio: libc::termios = unsafe { mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut saved_tio) } != 0 {
            let source = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(SerialError::NotATerminal {
                path: config.device.clone(),
                source,
            });
        }

        // Claim SIGIO before reconfiguring, so a refused claim leaves the
        // device exactly as we found it.
        let sigio = if config.read_mode == ReadMode::AsyncSignal {
            match SigioClaim::install(fd, notifier) {
                Ok(claim) => Some(claim),
                Err(e) => {
                    unsafe { libc::close(fd) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let mut tio: libc::termios = unsafe { mem::zeroed() };
        // CLOCAL: don't monitor modem control lines. CREAD: enable receiver.
        tio.c_cflag = libc::CLOCAL
            | libc::CREAD
            | config.data_bits.cflag()
            | config.parity.cflag()
            | config.stop_bits.cflag();
        tio.c_cflag &= !libc::CRTSCTS;
        tio.c_iflag = libc::IGNPAR;
        tio.c_oflag = 0;
        // Non-canonical input, no echo.
        tio.c_lflag = 0;
        if let ReadMode::Blocking {
            min_bytes,
            idle_tenths,
        } = config.read_mode
        {
            tio.c_cc[libc::VMIN] = min_bytes as libc::cc_t;
            tio.c_cc[libc::VTIME] = idle_tenths as libc::cc_t;
        } else {
            tio.c_cc[libc::VMIN] = 0;
            tio.c_cc[libc::VTIME] = 0;
        }
        unsafe {
            libc::cfsetispeed(&mut tio, config.baud.speed());
            libc::cfsetospeed(&mut tio, config.baud.speed());
        }

        // Discard bytes received but not yet read, and bytes written but not
        // yet transmitted, then apply the new configuration.
        if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } != 0
            || unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0
        {
            let source = io::Error::last_os_error();
            drop(sigio);
            unsafe { libc::close(fd) };
            return Err(SerialError::Io(source));
        }

        debug!(
            device = %config.device,
            baud = config.baud.bits_per_second(),
            mode = ?config.read_mode,
            "serial port opened"
        );

        Ok(Self {
            fd: Some(fd),
            saved_tio,
            config,
            sigio,
        })
    }

    /// The configuration this port was opened with
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Whether the port is still open
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Write bytes to the device.
    ///
    /// Returns the number of bytes actually written, which may be less than
    /// `bytes.len()`. Callers must treat a short count as a partial write, not
    /// as success.
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
        let fd = self.fd.ok_or(SerialError::Closed)?;
        let n = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        if n < 0 {
            let source = io::Error::last_os_error();
            if source.kind() == io::ErrorKind::WouldBlock {
                return Ok(0);
            }
            return Err(SerialError::Io(source));
        }
        let n = n as usize;
        if n < bytes.len() {
            trace!(requested = bytes.len(), written = n, "partial serial write");
        }
        Ok(n)
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// In the non-blocking modes a return of 0 means "no data currently
    /// available", not end of stream. A read interrupted by a signal also
    /// reports 0; the caller polls again.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let fd = self.fd.ok_or(SerialError::Closed)?;
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            let source = io::Error::last_os_error();
            match source.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => return Ok(0),
                _ => return Err(SerialError::Io(source)),
            }
        }
        Ok(n as usize)
    }

    /// Restore the device's prior configuration and release the descriptor.
    ///
    /// Idempotent: closing an already-closed port is a no-op.
    pub fn close(&mut self) {
        if let Some(fd) = self.fd.take() {
            self.sigio.take();
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &self.saved_tio) } != 0 {
                warn!(
                    device = %self.config.device,
                    "failed to restore terminal settings: {}",
                    io::Error::last_os_error()
                );
            }
            unsafe { libc::close(fd) };
            debug!(device = %self.config.device, "serial port closed");
        }
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        self.close();
    }
}

impl SerialLink for Port {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
        Port::send(self, bytes)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        Port::receive(self, buf)
    }
}
