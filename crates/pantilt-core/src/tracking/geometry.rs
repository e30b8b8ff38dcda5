//! Pointing geometry
//!
//! Converts a 3D offset in camera space into pan and tilt angles. Tilt is the
//! angle from the vertical (y) axis, so a target straight ahead sits at 90°;
//! pan is the azimuth within the tilted plane. Degenerate vectors resolve to
//! 0 rather than NaN.

use serde::{Deserialize, Serialize};

/// A point in camera space (millimetres)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// The camera origin
    pub const ORIGIN: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A direction between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    /// The vector pointing from `from` to `to`
    pub fn between(from: Point3, to: Point3) -> Self {
        Self {
            x: to.x - from.x,
            y: to.y - from.y,
            z: to.z - from.z,
        }
    }

    /// Euclidean length
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Angle from the vertical axis, radians in [0, π]; 0 for a zero vector
    pub fn tilt_rad(&self) -> f64 {
        let magnitude = self.magnitude();
        if magnitude > 0.0 {
            (self.y / magnitude).acos()
        } else {
            0.0
        }
    }

    /// Azimuth within the tilted plane, radians; 0 when the tilt plane is
    /// degenerate (straight up or down, or a zero vector)
    pub fn pan_rad(&self) -> f64 {
        let magnitude = self.magnitude();
        let sin_tilt = self.tilt_rad().sin();
        if sin_tilt > 0.0 && magnitude > 0.0 {
            // |x| ≤ sqrt(x² + z²) = magnitude · sin_tilt, so asin stays in domain
            (self.x / (magnitude * sin_tilt)).asin()
        } else {
            0.0
        }
    }

    /// Tilt in degrees
    pub fn tilt_deg(&self) -> f64 {
        self.tilt_rad().to_degrees()
    }

    /// Pan in degrees
    pub fn pan_deg(&self) -> f64 {
        self.pan_rad().to_degrees()
    }
}
