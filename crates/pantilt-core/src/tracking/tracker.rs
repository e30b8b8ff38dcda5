//! Nearest-point tracking loop
//!
//! Ties the collaborators together: depth frame in, closest point out,
//! pointing offset to the protocol engine. One frame per step, driven by the
//! caller's loop.

use tracing::{debug, warn};

use super::depth::{closest_point, DepthSource, PointConverter};
use super::geometry::{Point3, Vector3};
use super::TrackError;
use crate::protocol::{ProtocolEngine, ProtocolError};

/// Tilt angle of a target dead ahead (tilt is measured from the vertical axis)
const LEVEL_TILT_DEG: f64 = 90.0;

/// Default minimum offset worth moving for, degrees
pub const DEFAULT_DEADBAND_DEG: f64 = 0.5;

/// Outcome of one tracking step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// The unit was commanded by these relative offsets
    Moved { pan_deg: f64, tilt_deg: f64 },
    /// No valid target, or the target is within the deadband
    Held,
}

/// Follows the nearest point reported by a depth source
pub struct Tracker<S, C> {
    source: S,
    converter: C,
    engine: ProtocolEngine,
    deadband_deg: f64,
}

impl<S: DepthSource, C: PointConverter> Tracker<S, C> {
    pub fn new(source: S, converter: C, engine: ProtocolEngine) -> Self {
        Self {
            source,
            converter,
            engine,
            deadband_deg: DEFAULT_DEADBAND_DEG,
        }
    }

    /// Same tracker with a different minimum-movement threshold
    pub fn with_deadband(mut self, deadband_deg: f64) -> Self {
        self.deadband_deg = deadband_deg;
        self
    }

    /// Access the underlying engine (for zeroing before a run)
    pub fn engine_mut(&mut self) -> &mut ProtocolEngine {
        &mut self.engine
    }

    /// Process one frame: find the nearest point and re-aim the unit at it.
    pub fn step(&mut self) -> Result<StepOutcome, TrackError> {
        let frame = self.source.next_frame()?;
        let Some(nearest) = closest_point(&frame) else {
            debug!("no valid depth samples in frame");
            return Ok(StepOutcome::Held);
        };

        let target = self.converter.to_camera_space(&frame, nearest);
        let heading = Vector3::between(Point3::ORIGIN, target);
        let pan_deg = heading.pan_deg();
        let tilt_deg = LEVEL_TILT_DEG - heading.tilt_deg();

        if pan_deg.abs() < self.deadband_deg && tilt_deg.abs() < self.deadband_deg {
            return Ok(StepOutcome::Held);
        }

        debug!(
            x = nearest.x,
            y = nearest.y,
            depth_mm = nearest.depth_mm,
            pan_deg,
            tilt_deg,
            "re-aiming at nearest point"
        );
        self.engine.move_relative(pan_deg, tilt_deg)?;
        Ok(StepOutcome::Moved { pan_deg, tilt_deg })
    }

    /// Run up to `frames` steps. Device faults abort only the frame that hit
    /// them (the next frame reissues a fresh command); everything else stops
    /// the run.
    pub fn run(&mut self, frames: usize) -> Result<(), TrackError> {
        for _ in 0..frames {
            match self.step() {
                Ok(outcome) => debug!(?outcome, "tracking step"),
                Err(TrackError::Protocol(ProtocolError::DeviceFault(fault))) => {
                    warn!(%fault, "device rejected the move; continuing");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::SimulatedPtu;
    use crate::protocol::DeviceProfile;
    use crate::tracking::depth::{DepthFrame, PinholeConverter};
    use std::collections::VecDeque;
    use std::time::Duration;

    struct StaticSource {
        frames: VecDeque<DepthFrame>,
    }

    impl DepthSource for StaticSource {
        fn next_frame(&mut self) -> Result<DepthFrame, TrackError> {
            self.frames
                .pop_front()
                .ok_or_else(|| TrackError::Source("out of frames".into()))
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

    fn frame_with_target(width: usize, height: usize, x: usize, y: usize) -> DepthFrame {
        let mut pixels = vec![4000u16; width * height];
        pixels[y * width + x] = 900;
        DepthFrame::new(width, height, pixels).unwrap()
    }

    fn tracker_for(frames: Vec<DepthFrame>) -> Tracker<StaticSource, PinholeConverter> {
        let engine = ProtocolEngine::with_link(
            Box::new(SimulatedPtu::deterministic()),
            fast_profile(),
        );
        Tracker::new(
            StaticSource {
                frames: frames.into(),
            },
            PinholeConverter::default(),
            engine,
        )
    }

    #[test]
    fn test_centered_target_holds() {
        let mut tracker = tracker_for(vec![frame_with_target(9, 9, 4, 4)]);
        assert_eq!(tracker.step().unwrap(), StepOutcome::Held);
    }

    #[test]
    fn test_offcenter_target_moves_unit() {
        let mut tracker = tracker_for(vec![frame_with_target(9, 9, 8, 4)]);
        match tracker.step().unwrap() {
            StepOutcome::Moved { pan_deg, tilt_deg } => {
                assert!(pan_deg > 10.0, "pan was {}", pan_deg);
                assert!(tilt_deg.abs() < 1.0, "tilt was {}", tilt_deg);
            }
            StepOutcome::Held => panic!("expected a move"),
        }
    }

    #[test]
    fn test_empty_frame_holds() {
        let empty = DepthFrame::new(4, 4, vec![0; 16]).unwrap();
        let mut tracker = tracker_for(vec![empty]);
        assert_eq!(tracker.step().unwrap(), StepOutcome::Held);
    }

    #[test]
    fn test_run_consumes_all_frames() {
        let frames = vec![
            frame_with_target(9, 9, 0, 4),
            frame_with_target(9, 9, 8, 4),
            frame_with_target(9, 9, 4, 4),
        ];
        let mut tracker = tracker_for(frames);
        tracker.run(3).unwrap();
    }
}
