//! Byte-transport seam between the protocol engine and a device
//!
//! Implemented by the real [`Port`](super::Port) and by the simulated device
//! in [`crate::demo`], so everything above this line is testable without
//! hardware on the bench.

use super::SerialError;

/// A bidirectional byte link with non-blocking-friendly semantics
pub trait SerialLink: Send {
    /// Write bytes; returns the count actually written (may be short).
    fn send(&mut self, bytes: &[u8]) -> Result<usize, SerialError>;

    /// Read up to `buf.len()` bytes; 0 means "nothing available right now".
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;
}
