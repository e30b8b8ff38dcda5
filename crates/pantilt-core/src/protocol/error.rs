//! Protocol errors

use std::time::Duration;

use thiserror::Error;

use super::SessionState;
use crate::serial::SerialError;

/// Errors that can occur while talking to the pan-tilt unit
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("serial link error: {0}")]
    Serial(#[from] SerialError),

    /// The device answered with `!`, rejecting the command. The engine is
    /// back in `Idle`; the caller may reissue.
    #[error("device fault: {0}")]
    DeviceFault(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// A command was issued while another is outstanding. The protocol is
    /// half-duplex with a single outstanding session; this is a caller bug,
    /// rejected before any I/O.
    #[error("command already pending in state {0:?}")]
    CommandPending(SessionState),

    #[error("cannot encode command: {0}")]
    Encode(String),
}
