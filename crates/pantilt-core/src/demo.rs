//! Demo mode: simulated hardware for testing without a bench
//!
//! [`SimulatedPtu`] speaks the unit's wire protocol over the [`SerialLink`]
//! seam: it confirms motion commands, answers position queries, and faults on
//! garbage. [`SweepDepthSource`] produces frames whose nearest point orbits
//! the image center. Together they let the full tracking loop run end to end
//! in-process.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::serial::{SerialError, SerialLink};
use crate::tracking::{DepthFrame, DepthSource, TrackError};

/// Background depth of the simulated scene, millimetres
const SCENE_DEPTH_MM: u16 = 3500;

/// Depth of the simulated target
const TARGET_DEPTH_MM: u16 = 900;

/// An in-process pan-tilt unit
pub struct SimulatedPtu {
    inbound: Vec<u8>,
    outbound: VecDeque<u8>,
    pan_ticks: i32,
    tilt_ticks: i32,
    terse: bool,
    rng: StdRng,
    jitter: bool,
}

impl SimulatedPtu {
    /// Simulator with read/write chunking jitter, to exercise the partial
    /// read and write paths the way real serial hardware does
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().gen(), true)
    }

    /// Fully deterministic simulator: no jitter, fixed state
    pub fn deterministic() -> Self {
        Self::with_seed(0, false)
    }

    fn with_seed(seed: u64, jitter: bool) -> Self {
        Self {
            inbound: Vec::new(),
            outbound: VecDeque::new(),
            pan_ticks: 0,
            tilt_ticks: 0,
            terse: false,
            rng: StdRng::seed_from_u64(seed),
            jitter,
        }
    }

    /// Current pan axis position, raw encoder ticks
    pub fn pan_ticks(&self) -> i32 {
        self.pan_ticks
    }

    /// Current tilt axis position, raw encoder ticks
    pub fn tilt_ticks(&self) -> i32 {
        self.tilt_ticks
    }

    fn reply(&mut self, text: &str) {
        self.outbound.extend(text.bytes());
    }

    fn acknowledge(&mut self) {
        if self.terse {
            self.reply("* ");
        } else {
            self.reply("* ok ");
        }
    }

    fn fault(&mut self) {
        self.reply("! illegal command ");
    }

    /// Run one space-terminated command token
    fn execute(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }
        match token {
            "I" => self.acknowledge(),
            "FT" => {
                self.terse = true;
                self.acknowledge();
            }
            "A" => self.acknowledge(),
            _ => self.execute_axis(token),
        }
    }

    fn execute_axis(&mut self, token: &str) {
        let mut chars = token.chars();
        let is_pan = match chars.next() {
            Some('P') => true,
            Some('T') => false,
            _ => {
                self.fault();
                return;
            }
        };
        let rest = chars.as_str();
        if rest == "P" {
            // Position query: the simulator always reports tersely.
            let current = if is_pan { self.pan_ticks } else { self.tilt_ticks };
            self.reply(&format!("*{} ", current));
            return;
        }
        let mode = rest.chars().next();
        let value = mode.map_or("", |c| &rest[c.len_utf8()..]);
        match (mode, value.parse::<i32>()) {
            (Some('P'), Ok(target)) => {
                if is_pan {
                    self.pan_ticks = target;
                } else {
                    self.tilt_ticks = target;
                }
                self.acknowledge();
            }
            (Some('O'), Ok(offset)) => {
                if is_pan {
                    self.pan_ticks += offset;
                } else {
                    self.tilt_ticks += offset;
                }
                self.acknowledge();
            }
            _ => self.fault(),
        }
    }
}

impl Default for SimulatedPtu {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for SimulatedPtu {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let accept = if self.jitter && bytes.len() > 1 {
            self.rng.gen_range(1..=bytes.len())
        } else {
            bytes.len()
        };
        for &byte in &bytes[..accept] {
            if byte == b' ' {
                let token = String::from_utf8_lossy(&self.inbound).into_owned();
                self.inbound.clear();
                self.execute(&token);
            } else {
                self.inbound.push(byte);
            }
        }
        Ok(accept)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let mut want = buf.len().min(self.outbound.len());
        if self.jitter && want > 1 {
            want = self.rng.gen_range(1..=want);
        }
        for slot in buf.iter_mut().take(want) {
            *slot = self.outbound.pop_front().expect("want is capped at queue length");
        }
        Ok(want)
    }
}

/// Depth source whose nearest point orbits the frame center
pub struct SweepDepthSource {
    width: usize,
    height: usize,
    step: u64,
    rng: StdRng,
}

impl SweepDepthSource {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            step: 0,
            rng: StdRng::seed_from_u64(7),
        }
    }
}

impl DepthSource for SweepDepthSource {
    fn next_frame(&mut self) -> Result<DepthFrame, TrackError> {
        let mut pixels = Vec::with_capacity(self.width * self.height);
        for _ in 0..self.width * self.height {
            pixels.push(SCENE_DEPTH_MM + self.rng.gen_range(0..100));
        }

        let theta = self.step as f64 * 0.15;
        let orbit_x = self.width as f64 / 3.0;
        let orbit_y = self.height as f64 / 3.0;
        let x = (self.width as f64 / 2.0 + orbit_x * theta.cos()) as usize;
        let y = (self.height as f64 / 2.0 + orbit_y * theta.sin()) as usize;
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        pixels[y * self.width + x] = TARGET_DEPTH_MM;

        self.step += 1;
        DepthFrame::new(self.width, self.height, pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DeviceProfile, Joint, ProtocolEngine};
    use crate::tracking::closest_point;
    use std::time::Duration;

    fn drain(ptu: &mut SimulatedPtu) -> String {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = ptu.receive(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_absolute_and_relative_moves() {
        let mut ptu = SimulatedPtu::deterministic();
        ptu.send(b"PP100 ").unwrap();
        ptu.send(b"PO-40 ").unwrap();
        ptu.send(b"TO25 ").unwrap();
        assert_eq!(ptu.pan_ticks(), 60);
        assert_eq!(ptu.tilt_ticks(), 25);
        let replies = drain(&mut ptu);
        assert_eq!(replies.matches('*').count(), 3);
        assert!(!replies.contains('!'));
    }

    #[test]
    fn test_byte_at_a_time_commands() {
        let mut ptu = SimulatedPtu::deterministic();
        for byte in b"PP42 " {
            ptu.send(&[*byte]).unwrap();
        }
        assert_eq!(ptu.pan_ticks(), 42);
    }

    #[test]
    fn test_query_reports_position() {
        let mut ptu = SimulatedPtu::deterministic();
        ptu.send(b"TP-300 ").unwrap();
        drain(&mut ptu);
        ptu.send(b"TP ").unwrap();
        assert_eq!(drain(&mut ptu), "*-300 ");
    }

    #[test]
    fn test_garbage_faults() {
        let mut ptu = SimulatedPtu::deterministic();
        ptu.send(b"XYZZY ").unwrap();
        assert!(drain(&mut ptu).contains('!'));
    }

    #[test]
    fn test_terse_mode_shortens_acks() {
        let mut ptu = SimulatedPtu::deterministic();
        ptu.send(b"FT ").unwrap();
        drain(&mut ptu);
        ptu.send(b"A ").unwrap();
        assert_eq!(drain(&mut ptu), "* ");
    }

    #[test]
    fn test_engine_round_trip_with_jitter() {
        // The jittering simulator forces partial reads and writes through the
        // whole stack.
        let profile = DeviceProfile {
            settle_delay: Duration::from_millis(1),
            response_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(1),
            ..DeviceProfile::default()
        };
        let mut engine = ProtocolEngine::with_link(Box::new(SimulatedPtu::new()), profile);
        engine.move_relative(15.0, -5.0).unwrap();
        engine.zero().unwrap();
        let pan = engine.query_position(Joint::Pan).unwrap();
        assert_eq!(pan, Some(0.0));
    }

    #[test]
    fn test_sweep_source_always_has_a_nearest_point() {
        let mut source = SweepDepthSource::new(32, 24);
        for _ in 0..10 {
            let frame = source.next_frame().unwrap();
            let nearest = closest_point(&frame).unwrap();
            assert_eq!(nearest.depth_mm, TARGET_DEPTH_MM);
        }
    }
}
