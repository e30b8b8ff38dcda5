//! Buffered port: a serial link plus a ring buffer
//!
//! The single integration point between asynchronous byte arrival and the
//! synchronous consumer. `poll` must be called periodically from the main
//! flow, including in signal-driven mode, where the signal handler only wakes the
//! process and never drains the port itself.

use tracing::warn;

use super::channel::SerialLink;
use super::ring::RingBuffer;
use super::SerialError;

/// Bytes requested per receive call while draining
const DRAIN_CHUNK: usize = 32;

/// Default ring capacity
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// A serial link with buffered, poll-driven input
pub struct BufferedPort {
    link: Box<dyn SerialLink>,
    ring: RingBuffer,
}

impl BufferedPort {
    /// Wrap a link with the default buffer capacity
    pub fn new(link: Box<dyn SerialLink>) -> Self {
        Self::with_capacity(link, DEFAULT_BUFFER_CAPACITY)
    }

    /// Wrap a link with an explicit buffer capacity
    pub fn with_capacity(link: Box<dyn SerialLink>, capacity: usize) -> Self {
        Self {
            link,
            ring: RingBuffer::new(capacity),
        }
    }

    /// Drain everything the link currently has into the buffer.
    ///
    /// Reads in small chunks until the link reports no more bytes or the
    /// buffer fills. Bytes that do not fit are dropped with a warning, a
    /// backpressure signal that the consumer is not draining fast enough.
    /// Returns whether at least one byte is buffered afterward.
    pub fn poll(&mut self) -> Result<bool, SerialError> {
        let mut chunk = [0u8; DRAIN_CHUNK];
        while !self.ring.is_full() {
            let n = self.link.receive(&mut chunk)?;
            if n == 0 {
                break;
            }
            let mut lost = 0u32;
            for &byte in &chunk[..n] {
                if self.ring.enqueue(byte).is_err() {
                    lost += 1;
                }
            }
            if lost > 0 {
                warn!(
                    lost,
                    total_dropped = self.ring.dropped(),
                    "receive buffer overflow; bytes dropped"
                );
            }
        }
        Ok(!self.ring.is_empty())
    }

    /// Write bytes to the underlying link; returns the count written
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
        self.link.send(bytes)
    }

    /// Remove and return the oldest buffered byte
    pub fn dequeue_one(&mut self) -> Option<u8> {
        self.ring.dequeue()
    }

    /// All buffered bytes in FIFO order, optionally left in place
    pub fn take_all(&mut self, consume: bool) -> Vec<u8> {
        self.ring.peek_all(consume)
    }

    /// Number of buffered bytes
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Link that hands out scripted bytes in fixed-size slices
    struct ScriptedLink {
        pending: VecDeque<u8>,
        max_per_read: usize,
    }

    impl ScriptedLink {
        fn new(data: &[u8], max_per_read: usize) -> Self {
            Self {
                pending: data.iter().copied().collect(),
                max_per_read,
            }
        }
    }

    impl SerialLink for ScriptedLink {
        fn send(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
            Ok(bytes.len())
        }

        fn receive(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
            let want = buf.len().min(self.max_per_read).min(self.pending.len());
            for slot in buf.iter_mut().take(want) {
                *slot = self.pending.pop_front().unwrap();
            }
            Ok(want)
        }
    }

    #[test]
    fn test_poll_drains_across_partial_reads() {
        // 7 bytes arriving at most 3 per read: several receive calls per poll.
        let link = ScriptedLink::new(b"PT unit", 3);
        let mut port = BufferedPort::new(Box::new(link));
        assert!(port.poll().unwrap());
        assert_eq!(port.take_all(true), b"PT unit".to_vec());
        assert!(!port.poll().unwrap());
    }

    #[test]
    fn test_poll_with_no_data_reports_empty() {
        let link = ScriptedLink::new(b"", 8);
        let mut port = BufferedPort::new(Box::new(link));
        assert!(!port.poll().unwrap());
        assert_eq!(port.dequeue_one(), None);
    }

    #[test]
    fn test_poll_stops_at_capacity_and_drops_overflow() {
        let link = ScriptedLink::new(&[0xAAu8; 100], 32);
        let mut port = BufferedPort::with_capacity(Box::new(link), 10);
        assert!(port.poll().unwrap());
        assert_eq!(port.buffered(), 10);
    }

    #[test]
    fn test_nonconsuming_take_all_leaves_buffer() {
        let link = ScriptedLink::new(b"* ", 8);
        let mut port = BufferedPort::new(Box::new(link));
        port.poll().unwrap();
        assert_eq!(port.take_all(false), b"* ".to_vec());
        assert_eq!(port.buffered(), 2);
        assert_eq!(port.take_all(true), b"* ".to_vec());
        assert_eq!(port.buffered(), 0);
    }
}
