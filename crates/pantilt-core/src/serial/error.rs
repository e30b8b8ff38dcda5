//! Serial layer errors

use thiserror::Error;

/// Errors that can occur while opening or using a serial port
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("cannot open device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("device {path} is not a terminal device: {source}")]
    NotATerminal {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("port is closed")]
    Closed,

    #[error("signal-driven mode already claimed by another port")]
    SignalModeInUse,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
