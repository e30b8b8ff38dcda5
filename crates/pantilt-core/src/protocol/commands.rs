//! Wire command encoding
//!
//! The unit speaks a terse ASCII protocol: a joint letter, a mode letter, a
//! signed integer in raw encoder ticks, and a space terminator (the protocol
//! terminates on space, not newline). Administrative commands are bare
//! letters with the same terminator.

use serde::{Deserialize, Serialize};

use super::error::ProtocolError;
use super::profile::DeviceProfile;
use super::SessionState;

/// Wire terminator for every outbound command
pub const COMMAND_TERMINATOR: char = ' ';

/// Arc-seconds per degree, for tick conversion
const ARCSEC_PER_DEG: f64 = 3600.0;

/// A movable axis of the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Joint {
    /// Horizontal axis, wire code `P`
    Pan,
    /// Vertical axis, wire code `T`
    Tilt,
}

impl Joint {
    /// Single-letter wire code
    pub fn code(self) -> char {
        match self {
            Joint::Pan => 'P',
            Joint::Tilt => 'T',
        }
    }
}

/// Positioning mode for a motion command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveMode {
    /// Move to an absolute position, wire code `P`
    Absolute,
    /// Move by an offset from the current position, wire code `O`
    Relative,
}

impl MoveMode {
    /// Single-letter wire code
    pub fn code(self) -> char {
        match self {
            MoveMode::Absolute => 'P',
            MoveMode::Relative => 'O',
        }
    }
}

/// One outbound protocol command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Position one joint, in raw encoder ticks
    Move {
        joint: Joint,
        mode: MoveMode,
        ticks: i32,
    },
    /// Ask for a joint's current position
    QueryPosition { joint: Joint },
    /// Execute further commands immediately (`I`)
    ImmediateMode,
    /// Switch the unit to terse replies (`FT`)
    TerseFeedback,
    /// Block until in-progress motion completes (`A`)
    AwaitCompletion,
}

impl Command {
    /// The ASCII bytes for this command, terminator included
    pub fn wire(&self) -> String {
        match self {
            Command::Move { joint, mode, ticks } => {
                format!("{}{}{}{}", joint.code(), mode.code(), ticks, COMMAND_TERMINATOR)
            }
            Command::QueryPosition { joint } => {
                format!("{}P{}", joint.code(), COMMAND_TERMINATOR)
            }
            Command::ImmediateMode => format!("I{}", COMMAND_TERMINATOR),
            Command::TerseFeedback => format!("FT{}", COMMAND_TERMINATOR),
            Command::AwaitCompletion => format!("A{}", COMMAND_TERMINATOR),
        }
    }

    /// The session state the engine enters once this command is on the wire
    pub fn awaits(&self) -> SessionState {
        match self {
            Command::QueryPosition { joint: Joint::Pan } => SessionState::AwaitingPanPosition,
            Command::QueryPosition { joint: Joint::Tilt } => SessionState::AwaitingTiltPosition,
            _ => SessionState::AwaitingConfirmation,
        }
    }
}

/// Convert a degree value to raw encoder ticks for the given resolution.
///
/// Rejects non-finite input and values outside the 32-bit tick range before
/// any I/O happens.
pub fn degrees_to_ticks(degrees: f64, resolution_arcsec: f64) -> Result<i32, ProtocolError> {
    if !degrees.is_finite() {
        return Err(ProtocolError::Encode(format!(
            "degree value {} is not finite",
            degrees
        )));
    }
    let ticks = (degrees * ARCSEC_PER_DEG / resolution_arcsec).round();
    if ticks < i32::MIN as f64 || ticks > i32::MAX as f64 {
        return Err(ProtocolError::Encode(format!(
            "{} degrees is outside the encoder range",
            degrees
        )));
    }
    Ok(ticks as i32)
}

/// Convert raw encoder ticks back to degrees
pub fn ticks_to_degrees(ticks: i32, resolution_arcsec: f64) -> f64 {
    ticks as f64 * resolution_arcsec / ARCSEC_PER_DEG
}

/// Build a motion command from a degree value
pub fn position_command(
    degrees: f64,
    joint: Joint,
    mode: MoveMode,
    profile: &DeviceProfile,
) -> Result<Command, ProtocolError> {
    let ticks = degrees_to_ticks(degrees, profile.resolution_arcsec(joint))?;
    Ok(Command::Move { joint, mode, ticks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pan_absolute_zero() {
        let profile = DeviceProfile::default();
        let cmd = position_command(0.0, Joint::Pan, MoveMode::Absolute, &profile).unwrap();
        assert_eq!(cmd.wire(), "PP0 ");
    }

    #[test]
    fn test_tilt_relative_ten_degrees() {
        let profile = DeviceProfile::default();
        let cmd = position_command(10.0, Joint::Tilt, MoveMode::Relative, &profile).unwrap();
        let expected = (10.0 * 3600.0 / profile.tilt_resolution_arcsec).round() as i32;
        assert_eq!(cmd.wire(), format!("TO{} ", expected));
    }

    #[test]
    fn test_negative_degrees_are_signed() {
        let profile = DeviceProfile::default();
        let cmd = position_command(-5.0, Joint::Pan, MoveMode::Relative, &profile).unwrap();
        let wire = cmd.wire();
        assert!(wire.starts_with("PO-"), "wire was {:?}", wire);
        assert!(wire.ends_with(' '));
    }

    #[test]
    fn test_admin_commands() {
        assert_eq!(Command::ImmediateMode.wire(), "I ");
        assert_eq!(Command::TerseFeedback.wire(), "FT ");
        assert_eq!(Command::AwaitCompletion.wire(), "A ");
        assert_eq!(
            Command::QueryPosition { joint: Joint::Tilt }.wire(),
            "TP "
        );
    }

    #[test]
    fn test_query_enters_position_states() {
        assert_eq!(
            Command::QueryPosition { joint: Joint::Pan }.awaits(),
            SessionState::AwaitingPanPosition
        );
        assert_eq!(
            Command::QueryPosition { joint: Joint::Tilt }.awaits(),
            SessionState::AwaitingTiltPosition
        );
        assert_eq!(
            Command::AwaitCompletion.awaits(),
            SessionState::AwaitingConfirmation
        );
    }

    #[test]
    fn test_non_finite_degrees_rejected() {
        let profile = DeviceProfile::default();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            match position_command(bad, Joint::Pan, MoveMode::Relative, &profile) {
                Err(ProtocolError::Encode(_)) => {}
                other => panic!("expected Encode error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_out_of_range_degrees_rejected() {
        let profile = DeviceProfile::default();
        match position_command(1.0e15, Joint::Pan, MoveMode::Absolute, &profile) {
            Err(ProtocolError::Encode(_)) => {}
            other => panic!("expected Encode error, got {:?}", other),
        }
    }

    #[test]
    fn test_tick_conversion_round_trip() {
        let res = 185.1428;
        let ticks = degrees_to_ticks(63.4, res).unwrap();
        let degrees = ticks_to_degrees(ticks, res);
        assert!((degrees - 63.4).abs() < 0.1);
    }
}
