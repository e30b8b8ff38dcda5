//! Process-wide SIGIO notification state
//!
//! Signal-driven input is inherently global: one handler, one signal number
//! per process. The claim is explicit: installed when a port opens in
//! [`ReadMode::AsyncSignal`](super::ReadMode::AsyncSignal), released when that
//! port closes. A second port attempting the claim fails with
//! [`SerialError::SignalModeInUse`].
//!
//! The handler does no I/O. Its whole contract is "wake the process": it sets
//! an atomic input-ready flag (a pending signal also interrupts any sleep) and
//! invokes the optional caller-supplied notifier. All byte draining happens
//! later, on the main flow, inside `BufferedPort::poll`.

use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::SerialError;

static CLAIMED: AtomicBool = AtomicBool::new(false);
static INPUT_READY: AtomicBool = AtomicBool::new(false);
static NOTIFIER: AtomicUsize = AtomicUsize::new(0);

/// Returns whether SIGIO fired since the last call, clearing the flag.
pub fn take_input_ready() -> bool {
    INPUT_READY.swap(false, Ordering::AcqRel)
}

extern "C" fn on_sigio(_signo: libc::c_int) {
    // Must stay async-signal-safe: touch atomics, call the notifier, return.
    INPUT_READY.store(true, Ordering::Release);
    let raw = NOTIFIER.load(Ordering::Acquire);
    if raw != 0 {
        let notify: fn() = unsafe { mem::transmute(raw) };
        notify();
    }
}

/// Holds the process-wide SIGIO claim for one open port.
///
/// Dropping the claim restores the previous signal disposition.
pub(crate) struct SigioClaim {
    prev: libc::sigaction,
}

impl SigioClaim {
    /// Install the SIGIO handler and direct the descriptor's input-ready
    /// notifications at this process (`F_SETOWN` + `O_ASYNC`).
    pub(crate) fn install(
        fd: libc::c_int,
        notifier: Option<fn()>,
    ) -> Result<Self, SerialError> {
        if CLAIMED.swap(true, Ordering::AcqRel) {
            return Err(SerialError::SignalModeInUse);
        }
        NOTIFIER.store(
            notifier.map(|f| f as usize).unwrap_or(0),
            Ordering::Release,
        );
        INPUT_READY.store(false, Ordering::Release);

        let mut action: libc::sigaction = unsafe { mem::zeroed() };
        action.sa_sigaction = on_sigio as usize;
        unsafe { libc::sigemptyset(&mut action.sa_mask) };
        let mut prev: libc::sigaction = unsafe { mem::zeroed() };
        if unsafe { libc::sigaction(libc::SIGIO, &action, &mut prev) } != 0 {
            let source = io::Error::last_os_error();
            Self::clear_state();
            return Err(SerialError::Io(source));
        }

        if unsafe { libc::fcntl(fd, libc::F_SETOWN, libc::getpid()) } < 0 {
            let source = io::Error::last_os_error();
            unsafe { libc::sigaction(libc::SIGIO, &prev, ptr::null_mut()) };
            Self::clear_state();
            return Err(SerialError::Io(source));
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFL, libc::O_ASYNC | libc::O_NONBLOCK) } < 0 {
            let source = io::Error::last_os_error();
            unsafe { libc::sigaction(libc::SIGIO, &prev, ptr::null_mut()) };
            Self::clear_state();
            return Err(SerialError::Io(source));
        }

        tracing::debug!("SIGIO claim installed for fd {}", fd);
        Ok(Self { prev })
    }

    fn clear_state() {
        NOTIFIER.store(0, Ordering::Release);
        INPUT_READY.store(false, Ordering::Release);
        CLAIMED.store(false, Ordering::Release);
    }
}

impl Drop for SigioClaim {
    fn drop(&mut self) {
        unsafe { libc::sigaction(libc::SIGIO, &self.prev, ptr::null_mut()) };
        Self::clear_state();
        tracing::debug!("SIGIO claim released");
    }
}
