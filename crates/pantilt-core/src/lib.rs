//! # Pantilt Core Library
//!
//! Serial control and nearest-point tracking for pan-tilt units.
//!
//! This library provides:
//! - A POSIX serial port with three read disciplines (blocking, polling,
//!   signal-driven)
//! - A fixed-capacity ring buffer decoupling byte arrival from consumption
//! - The unit's ASCII command/response protocol state machine
//! - A tracking loop following the nearest point of a depth source
//!
//! ## Example
//!
//! ```rust,ignore
//! use pantilt_core::protocol::ProtocolEngine;
//! use pantilt_core::serial::BaudRate;
//!
//! let mut engine = ProtocolEngine::open("/dev/ttyUSB0", BaudRate::B9600)?;
//! engine.zero()?;
//! engine.move_relative(12.5, -3.0)?;
//! ```

#![warn(missing_docs)]

pub mod demo;
pub mod protocol;
pub mod serial;
pub mod tracking;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::demo::{SimulatedPtu, SweepDepthSource};
    pub use crate::protocol::{
        DeviceProfile, Joint, MoveMode, PanTilt, ProtocolEngine, ProtocolError, SessionState,
    };
    pub use crate::serial::{
        BaudRate, BufferedPort, Port, PortConfig, ReadMode, RingBuffer, SerialError, SerialLink,
    };
    pub use crate::tracking::{DepthFrame, DepthSource, PointConverter, TrackError, Tracker};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
