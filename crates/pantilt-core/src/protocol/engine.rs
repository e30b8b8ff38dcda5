//! Command/response protocol engine
//!
//! A half-duplex state machine over a [`BufferedPort`]: one command on the
//! wire at a time, confirmations (`*`) and faults (`!`) classified out of the
//! buffered input. All polling happens on the caller's thread; in
//! signal-driven read mode the signal only wakes the process and the drain
//! still runs here.

use std::mem;
use std::thread;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::commands::{position_command, ticks_to_degrees, Command, Joint, MoveMode};
use super::error::ProtocolError;
use super::profile::DeviceProfile;
use crate::serial::{BaudRate, BufferedPort, Port, PortConfig, SerialLink};

/// Protocol session state: which response, if any, the engine is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No command outstanding
    Idle,
    /// A command was sent; waiting for `*`
    AwaitingConfirmation,
    /// A pan position query was sent; waiting for `*<ticks> `
    AwaitingPanPosition,
    /// A tilt position query was sent; waiting for `*<ticks> `
    AwaitingTiltPosition,
}

/// Last-known joint positions in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PanTilt {
    pub pan_deg: f64,
    pub tilt_deg: f64,
}

/// What a poll resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// The outstanding command was confirmed
    Acknowledged,
    /// A position query resolved
    Position { joint: Joint, degrees: f64 },
    /// Data was discarded: unexpected while idle, or unparsable
    Ignored,
}

enum PositionReply {
    Complete(i32),
    Incomplete,
    Malformed,
}

/// Parse `*<ticks> ` out of buffered content. Anything after `*` that is not
/// yet terminated keeps the session waiting; a terminated non-integer token is
/// malformed.
fn parse_position_reply(text: &str) -> PositionReply {
    let Some(star) = text.find('*') else {
        return PositionReply::Incomplete;
    };
    let token = text[star + 1..].trim_start();
    let Some(end) = token.find(' ') else {
        return PositionReply::Incomplete;
    };
    match token[..end].parse::<i32>() {
        Ok(ticks) => PositionReply::Complete(ticks),
        Err(_) => PositionReply::Malformed,
    }
}

/// Protocol state machine for one pan-tilt unit
pub struct ProtocolEngine {
    port: BufferedPort,
    profile: DeviceProfile,
    state: SessionState,
    last_position: PanTilt,
}

impl ProtocolEngine {
    /// Build an engine over an already-open buffered port
    pub fn new(port: BufferedPort, profile: DeviceProfile) -> Self {
        Self {
            port,
            profile,
            state: SessionState::Idle,
            last_position: PanTilt::default(),
        }
    }

    /// Build an engine over any byte link (a simulated device, for instance)
    pub fn with_link(link: Box<dyn SerialLink>, profile: DeviceProfile) -> Self {
        Self::new(BufferedPort::new(link), profile)
    }

    /// Open a device with the usual defaults (8N1, polled non-blocking reads)
    /// and the default device profile. Only the path and baud rate need to be
    /// supplied.
    pub fn open(device: impl Into<String>, baud: BaudRate) -> Result<Self, ProtocolError> {
        let port = Port::open(PortConfig::new(device, baud))?;
        Ok(Self::with_link(Box::new(port), DeviceProfile::default()))
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last position reported by the device, degrees
    pub fn last_position(&self) -> PanTilt {
        self.last_position
    }

    /// The profile this engine was built with
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Encode a motion command without sending it
    pub fn encode_position_command(
        &self,
        degrees: f64,
        joint: Joint,
        mode: MoveMode,
    ) -> Result<String, ProtocolError> {
        Ok(position_command(degrees, joint, mode, &self.profile)?.wire())
    }

    /// Abandon the outstanding command, if any, and discard buffered input.
    ///
    /// A late reply to the abandoned command will surface as unexpected data
    /// while idle.
    pub fn abort(&mut self) {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "aborting outstanding command");
        }
        self.state = SessionState::Idle;
        self.port.take_all(true);
    }

    /// Drain the link and classify whatever has arrived.
    ///
    /// Returns `Ok(None)` while a response is still incomplete. A device
    /// fault (`!` anywhere in the input) aborts the outstanding command from
    /// any state and surfaces as [`ProtocolError::DeviceFault`].
    pub fn poll(&mut self) -> Result<Option<ResponseEvent>, ProtocolError> {
        self.port.poll()?;
        if self.port.buffered() == 0 {
            return Ok(None);
        }
        let pending = self.port.take_all(false);
        let text = String::from_utf8_lossy(&pending).into_owned();

        if text.contains('!') {
            self.port.take_all(true);
            let state = mem::replace(&mut self.state, SessionState::Idle);
            warn!(?state, response = %text.trim(), "device reported an error");
            return Err(ProtocolError::DeviceFault(text.trim().to_string()));
        }

        match self.state {
            SessionState::Idle => {
                self.port.take_all(true);
                debug!(data = %text.trim(), "unexpected data while idle; discarded");
                Ok(Some(ResponseEvent::Ignored))
            }
            SessionState::AwaitingConfirmation => {
                if text.contains('*') {
                    self.port.take_all(true);
                    self.state = SessionState::Idle;
                    trace!("command acknowledged");
                    Ok(Some(ResponseEvent::Acknowledged))
                } else {
                    Ok(None)
                }
            }
            SessionState::AwaitingPanPosition | SessionState::AwaitingTiltPosition => {
                let joint = if self.state == SessionState::AwaitingPanPosition {
                    Joint::Pan
                } else {
                    Joint::Tilt
                };
                match parse_position_reply(&text) {
                    PositionReply::Incomplete => Ok(None),
                    PositionReply::Malformed => {
                        self.port.take_all(true);
                        self.state = SessionState::Idle;
                        warn!(data = %text.trim(), "unparsable position reply; discarded");
                        Ok(Some(ResponseEvent::Ignored))
                    }
                    PositionReply::Complete(ticks) => {
                        self.port.take_all(true);
                        self.state = SessionState::Idle;
                        let degrees =
                            ticks_to_degrees(ticks, self.profile.resolution_arcsec(joint));
                        match joint {
                            Joint::Pan => self.last_position.pan_deg = degrees,
                            Joint::Tilt => self.last_position.tilt_deg = degrees,
                        }
                        debug!(?joint, ticks, degrees, "position reply");
                        Ok(Some(ResponseEvent::Position { joint, degrees }))
                    }
                }
            }
        }
    }

    /// Put one command on the wire and enter its await state.
    ///
    /// Rejected with [`ProtocolError::CommandPending`] while a prior command
    /// is unresolved; the protocol allows a single outstanding session.
    pub fn send_command(&mut self, command: &Command) -> Result<(), ProtocolError> {
        if self.state != SessionState::Idle {
            return Err(ProtocolError::CommandPending(self.state));
        }
        let wire = command.wire();
        self.transmit(wire.as_bytes())?;
        trace!(command = %wire.trim_end(), "command sent");
        self.state = command.awaits();
        Ok(())
    }

    /// Write all bytes, retrying short writes until done or out of time
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let deadline = Instant::now() + self.profile.response_timeout;
        let mut sent = 0;
        while sent < bytes.len() {
            let n = self.port.send(&bytes[sent..])?;
            sent += n;
            if n == 0 {
                if Instant::now() >= deadline {
                    return Err(ProtocolError::Timeout(self.profile.response_timeout));
                }
                thread::sleep(self.profile.poll_interval);
            }
        }
        Ok(())
    }

    /// Poll until the outstanding command resolves or the response timeout
    /// elapses. On timeout the session returns to idle and stale bytes are
    /// discarded.
    pub fn await_resolution(&mut self) -> Result<ResponseEvent, ProtocolError> {
        let deadline = Instant::now() + self.profile.response_timeout;
        loop {
            if let Some(event) = self.poll()? {
                if self.state == SessionState::Idle {
                    return Ok(event);
                }
            }
            if Instant::now() >= deadline {
                let state = mem::replace(&mut self.state, SessionState::Idle);
                self.port.take_all(true);
                warn!(?state, "timed out waiting for device response");
                return Err(ProtocolError::Timeout(self.profile.response_timeout));
            }
            thread::sleep(self.profile.poll_interval);
        }
    }

    /// Move both joints by relative offsets, pan first.
    ///
    /// Both commands are encoded before either is sent: an un-encodable tilt
    /// offset means the pan command is never transmitted. Strictly
    /// sequential: the tilt command goes out only after the pan command is
    /// confirmed.
    pub fn move_relative(&mut self, pan_deg: f64, tilt_deg: f64) -> Result<(), ProtocolError> {
        self.move_both(pan_deg, tilt_deg, MoveMode::Relative)
    }

    /// Move both joints to absolute positions, pan first. Same atomicity as
    /// [`Self::move_relative`].
    pub fn move_absolute(&mut self, pan_deg: f64, tilt_deg: f64) -> Result<(), ProtocolError> {
        self.move_both(pan_deg, tilt_deg, MoveMode::Absolute)
    }

    fn move_both(
        &mut self,
        pan_deg: f64,
        tilt_deg: f64,
        mode: MoveMode,
    ) -> Result<(), ProtocolError> {
        let pan = position_command(pan_deg, Joint::Pan, mode, &self.profile)?;
        let tilt = position_command(tilt_deg, Joint::Tilt, mode, &self.profile)?;
        self.send_command(&pan)?;
        self.await_resolution()?;
        self.send_command(&tilt)?;
        self.await_resolution()?;
        Ok(())
    }

    /// Ask the device for a joint's position.
    ///
    /// Returns `None` when the reply was unparsable and discarded (a low-rate
    /// control channel; the caller just asks again).
    pub fn query_position(&mut self, joint: Joint) -> Result<Option<f64>, ProtocolError> {
        self.send_command(&Command::QueryPosition { joint })?;
        match self.await_resolution()? {
            ResponseEvent::Position { degrees, .. } => Ok(Some(degrees)),
            _ => Ok(None),
        }
    }

    /// Drive the unit through its zeroing script: immediate mode, terse
    /// replies, pan to zero, then a tilt sweep to both travel limits, awaiting
    /// motion completion after each move. Each step settles for
    /// [`DeviceProfile::settle_delay`] before its reply is collected.
    pub fn zero(&mut self) -> Result<(), ProtocolError> {
        let steps = [
            Command::ImmediateMode,
            Command::TerseFeedback,
            position_command(0.0, Joint::Pan, MoveMode::Absolute, &self.profile)?,
            Command::AwaitCompletion,
            position_command(
                self.profile.tilt_sweep_min_deg,
                Joint::Tilt,
                MoveMode::Absolute,
                &self.profile,
            )?,
            Command::AwaitCompletion,
            position_command(
                self.profile.tilt_sweep_max_deg,
                Joint::Tilt,
                MoveMode::Absolute,
                &self.profile,
            )?,
            Command::AwaitCompletion,
        ];
        for command in &steps {
            self.send_command(command)?;
            thread::sleep(self.profile.settle_delay);
            self.await_resolution()?;
        }
        info!("zero sequence complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::SerialError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Test link with externally scriptable receive bytes. Half-duplex like
    /// the real device: scripted replies become readable only after a send.
    #[derive(Clone, Default)]
    struct FakeLink {
        rx: Arc<Mutex<VecDeque<u8>>>,
        script: Arc<Mutex<VecDeque<Vec<u8>>>>,
        sent: Arc<Mutex<Vec<u8>>>,
        /// When set, each send accepts at most this many bytes
        write_limit: Arc<Mutex<Option<usize>>>,
    }

    impl FakeLink {
        fn inject(&self, bytes: &[u8]) {
            self.rx.lock().unwrap().extend(bytes.iter().copied());
        }

        fn limit_writes(&self, limit: usize) {
            *self.write_limit.lock().unwrap() = Some(limit);
        }

        fn script_reply(&self, bytes: &[u8]) {
            self.script.lock().unwrap().push_back(bytes.to_vec());
        }

        fn sent_text(&self) -> String {
            String::from_utf8(self.sent.lock().unwrap().clone()).unwrap()
        }
    }

    impl SerialLink for FakeLink {
        fn send(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
            let accept = match *self.write_limit.lock().unwrap() {
                Some(limit) => bytes.len().min(limit),
                None => bytes.len(),
            };
            self.sent.lock().unwrap().extend_from_slice(&bytes[..accept]);
            if let Some(reply) = self.script.lock().unwrap().pop_front() {
                self.rx.lock().unwrap().extend(reply);
            }
            Ok(accept)
        }

        fn receive(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
            let mut rx = self.rx.lock().unwrap();
            let want = buf.len().min(rx.len());
            for slot in buf.iter_mut().take(want) {
                *slot = rx.pop_front().unwrap();
            }
            Ok(want)
        }
    }

    fn fast_profile() -> DeviceProfile {
        DeviceProfile {
            settle_delay: Duration::from_millis(1),
            response_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(1),
            ..DeviceProfile::default()
        }
    }

    fn engine_with_link() -> (ProtocolEngine, FakeLink) {
        let link = FakeLink::default();
        let engine = ProtocolEngine::with_link(Box::new(link.clone()), fast_profile());
        (engine, link)
    }

    #[test]
    fn test_confirmation_resolves_to_idle() {
        let (mut engine, link) = engine_with_link();
        engine.send_command(&Command::ImmediateMode).unwrap();
        assert_eq!(engine.state(), SessionState::AwaitingConfirmation);
        link.inject(b"* ");
        assert_eq!(
            engine.await_resolution().unwrap(),
            ResponseEvent::Acknowledged
        );
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_fault_aborts_from_any_state() {
        let (mut engine, link) = engine_with_link();
        engine
            .send_command(&Command::QueryPosition { joint: Joint::Pan })
            .unwrap();
        link.inject(b"! illegal command ");
        match engine.await_resolution() {
            Err(ProtocolError::DeviceFault(text)) => assert!(text.contains('!')),
            other => panic!("expected DeviceFault, got {:?}", other),
        }
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_fault_while_idle_is_still_reported() {
        let (mut engine, link) = engine_with_link();
        link.inject(b"!E ");
        match engine.poll() {
            Err(ProtocolError::DeviceFault(_)) => {}
            other => panic!("expected DeviceFault, got {:?}", other),
        }
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_position_reply_parses_and_converts() {
        let (mut engine, link) = engine_with_link();
        engine
            .send_command(&Command::QueryPosition { joint: Joint::Pan })
            .unwrap();
        link.inject(b"*1234 ");
        let event = engine.await_resolution().unwrap();
        let expected = 1234.0 * engine.profile().pan_resolution_arcsec / 3600.0;
        match event {
            ResponseEvent::Position { joint, degrees } => {
                assert_eq!(joint, Joint::Pan);
                assert!((degrees - expected).abs() < 1e-9);
            }
            other => panic!("expected Position, got {:?}", other),
        }
        assert!((engine.last_position().pan_deg - expected).abs() < 1e-9);
    }

    #[test]
    fn test_partial_reply_keeps_waiting() {
        let (mut engine, link) = engine_with_link();
        engine
            .send_command(&Command::QueryPosition { joint: Joint::Tilt })
            .unwrap();
        // Terminator not yet on the wire: the session must stay open.
        link.inject(b"*12");
        assert_eq!(engine.poll().unwrap(), None);
        assert_eq!(engine.state(), SessionState::AwaitingTiltPosition);
        link.inject(b"34 ");
        match engine.poll().unwrap() {
            Some(ResponseEvent::Position { joint, .. }) => assert_eq!(joint, Joint::Tilt),
            other => panic!("expected Position, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_position_is_discarded() {
        let (mut engine, link) = engine_with_link();
        engine
            .send_command(&Command::QueryPosition { joint: Joint::Pan })
            .unwrap();
        link.inject(b"*pos? ");
        assert_eq!(engine.poll().unwrap(), Some(ResponseEvent::Ignored));
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(engine.last_position(), PanTilt::default());
    }

    #[test]
    fn test_unexpected_data_while_idle_is_ignored() {
        let (mut engine, link) = engine_with_link();
        link.inject(b"*42 ");
        assert_eq!(engine.poll().unwrap(), Some(ResponseEvent::Ignored));
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_second_command_while_pending_is_rejected() {
        let (mut engine, _link) = engine_with_link();
        engine.send_command(&Command::ImmediateMode).unwrap();
        match engine.send_command(&Command::AwaitCompletion) {
            Err(ProtocolError::CommandPending(SessionState::AwaitingConfirmation)) => {}
            other => panic!("expected CommandPending, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_returns_engine_to_idle() {
        let (mut engine, _link) = engine_with_link();
        engine.send_command(&Command::ImmediateMode).unwrap();
        match engine.await_resolution() {
            Err(ProtocolError::Timeout(_)) => {}
            other => panic!("expected Timeout, got {:?}", other),
        }
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_move_relative_atomic_encode() {
        let (mut engine, link) = engine_with_link();
        // Tilt fails to encode, so the pan command must never hit the wire.
        match engine.move_relative(5.0, f64::NAN) {
            Err(ProtocolError::Encode(_)) => {}
            other => panic!("expected Encode error, got {:?}", other),
        }
        assert_eq!(link.sent_text(), "");
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_move_relative_is_sequential() {
        let (mut engine, link) = engine_with_link();
        link.script_reply(b"* ");
        link.script_reply(b"* ");
        engine.move_relative(10.0, -10.0).unwrap();
        let sent = link.sent_text();
        let ticks = (10.0 * 3600.0 / engine.profile().pan_resolution_arcsec).round() as i32;
        assert_eq!(sent, format!("PO{} TO-{} ", ticks, ticks));
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_zero_runs_full_script() {
        let (mut engine, link) = engine_with_link();
        for _ in 0..8 {
            link.script_reply(b"* ");
        }
        engine.zero().unwrap();
        let sent = link.sent_text();
        assert!(sent.starts_with("I FT PP0 A "), "sent was {:?}", sent);
        assert_eq!(sent.matches("A ").count(), 3);
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_short_writes_are_retried_to_completion() {
        let (mut engine, link) = engine_with_link();
        link.limit_writes(3);
        engine
            .send_command(&Command::Move {
                joint: Joint::Pan,
                mode: MoveMode::Relative,
                ticks: 194,
            })
            .unwrap();
        assert_eq!(link.sent_text(), "PO194 ");
    }

    #[test]
    fn test_abort_discards_late_reply() {
        let (mut engine, link) = engine_with_link();
        engine.send_command(&Command::ImmediateMode).unwrap();
        engine.abort();
        assert_eq!(engine.state(), SessionState::Idle);
        // The late confirmation is now just unexpected idle data.
        link.inject(b"* ");
        assert_eq!(engine.poll().unwrap(), Some(ResponseEvent::Ignored));
    }
}
