//! Nearest-point tracking
//!
//! The collaborators around the protocol core: depth frames and the
//! nearest-point scan, the pointing geometry, and the loop that feeds pan/tilt
//! offsets into the protocol engine. Sensor drivers stay outside; a source
//! plugs in through the [`DepthSource`] and [`PointConverter`] traits.

pub mod depth;
pub mod geometry;
mod tracker;

use thiserror::Error;

pub use depth::{closest_point, DepthFrame, DepthPixel, DepthSource, PinholeConverter, PointConverter};
pub use geometry::{Point3, Vector3};
pub use tracker::{StepOutcome, Tracker, DEFAULT_DEADBAND_DEG};

use crate::protocol::ProtocolError;

/// Errors from the tracking loop and its collaborators
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("depth source failed: {0}")]
    Source(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
