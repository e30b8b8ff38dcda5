//! Serial communication stack
//!
//! Three layers: [`Port`] (raw termios device access with three read
//! disciplines), [`RingBuffer`] (fixed-capacity FIFO decoupling byte arrival
//! from consumption), and [`BufferedPort`] (the poll-driven composition of the
//! two). [`SerialLink`] is the seam that lets the protocol engine run against
//! a simulated device.

mod buffered;
mod channel;
mod config;
pub mod discover;
mod error;
mod port;
mod ring;
pub(crate) mod signal;

pub use buffered::{BufferedPort, DEFAULT_BUFFER_CAPACITY};
pub use channel::SerialLink;
pub use config::{
    BaudRate, DataBits, Parity, PortConfig, ReadMode, StopBits, DEFAULT_BLOCKING_IDLE_TENTHS,
    DEFAULT_BLOCKING_MIN_BYTES,
};
pub use error::SerialError;
pub use port::Port;
pub use ring::{Overflow, RingBuffer};
pub use signal::take_input_ready;
