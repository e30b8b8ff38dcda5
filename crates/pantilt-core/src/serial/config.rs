//! Port configuration
//!
//! All settings are fixed at open time. Reconfiguring an open port requires
//! closing it and opening a new one.

use serde::{Deserialize, Serialize};

/// Default VMIN for blocking reads: minimum bytes before read() returns.
pub const DEFAULT_BLOCKING_MIN_BYTES: u8 = 9;

/// Default VTIME for blocking reads, in tenths of a second.
pub const DEFAULT_BLOCKING_IDLE_TENTHS: u8 = 5;

/// Symbolic baud rate (termios speed constants, not raw integers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaudRate {
    B1200,
    B2400,
    B4800,
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
}

impl BaudRate {
    /// The termios speed constant for this rate
    pub(crate) fn speed(self) -> libc::speed_t {
        match self {
            BaudRate::B1200 => libc::B1200,
            BaudRate::B2400 => libc::B2400,
            BaudRate::B4800 => libc::B4800,
            BaudRate::B9600 => libc::B9600,
            BaudRate::B19200 => libc::B19200,
            BaudRate::B38400 => libc::B38400,
            BaudRate::B57600 => libc::B57600,
            BaudRate::B115200 => libc::B115200,
        }
    }

    /// Bits per second, for display
    pub fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::B1200 => 1200,
            BaudRate::B2400 => 2400,
            BaudRate::B4800 => 4800,
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
        }
    }

    /// Look up a symbolic rate from an integer bps value
    pub fn from_bits_per_second(bps: u32) -> Option<Self> {
        match bps {
            1200 => Some(BaudRate::B1200),
            2400 => Some(BaudRate::B2400),
            4800 => Some(BaudRate::B4800),
            9600 => Some(BaudRate::B9600),
            19200 => Some(BaudRate::B19200),
            38400 => Some(BaudRate::B38400),
            57600 => Some(BaudRate::B57600),
            115200 => Some(BaudRate::B115200),
            _ => None,
        }
    }
}

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    pub(crate) fn cflag(self) -> libc::tcflag_t {
        match self {
            DataBits::Five => libc::CS5,
            DataBits::Six => libc::CS6,
            DataBits::Seven => libc::CS7,
            DataBits::Eight => libc::CS8,
        }
    }
}

/// Parity discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl Parity {
    pub(crate) fn cflag(self) -> libc::tcflag_t {
        match self {
            Parity::None => 0,
            Parity::Even => libc::PARENB,
            Parity::Odd => libc::PARENB | libc::PARODD,
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    pub(crate) fn cflag(self) -> libc::tcflag_t {
        match self {
            StopBits::One => 0,
            StopBits::Two => libc::CSTOPB,
        }
    }
}

/// Read discipline applied at open time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadMode {
    /// read() blocks until `min_bytes` arrive or the line stays idle for
    /// `idle_tenths` tenths of a second after the first byte (VMIN/VTIME).
    Blocking { min_bytes: u8, idle_tenths: u8 },
    /// read() returns immediately with whatever is available, possibly nothing.
    Polling,
    /// Like `Polling`, but the process also receives SIGIO whenever input
    /// arrives. Only one port per process may use this mode.
    AsyncSignal,
}

impl ReadMode {
    /// Blocking mode with the default VMIN/VTIME settings
    pub fn blocking() -> Self {
        ReadMode::Blocking {
            min_bytes: DEFAULT_BLOCKING_MIN_BYTES,
            idle_tenths: DEFAULT_BLOCKING_IDLE_TENTHS,
        }
    }

    /// Whether the descriptor is opened O_NONBLOCK
    pub(crate) fn is_non_blocking(self) -> bool {
        !matches!(self, ReadMode::Blocking { .. })
    }
}

/// Immutable serial port configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub device: String,
    /// Line speed
    pub baud: BaudRate,
    /// Data bits per character
    pub data_bits: DataBits,
    /// Parity discipline
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Read discipline
    pub read_mode: ReadMode,
}

impl PortConfig {
    /// Configuration with the usual 8N1 settings and non-blocking polled
    /// reads; only the device path and the baud rate need to be supplied.
    pub fn new(device: impl Into<String>, baud: BaudRate) -> Self {
        Self {
            device: device.into(),
            baud,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_mode: ReadMode::Polling,
        }
    }

    /// Same configuration with a different read mode
    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }
}
