//! Depth frames and nearest-point extraction
//!
//! The depth sensor itself is a collaborator behind [`DepthSource`]; only the
//! frame representation and the nearest-point scan live here. Depths are in
//! millimetres, 0 meaning "no reading" for that pixel.

use serde::{Deserialize, Serialize};

use super::geometry::Point3;
use super::TrackError;

/// One depth image, row-major
#[derive(Debug, Clone)]
pub struct DepthFrame {
    width: usize,
    height: usize,
    pixels: Vec<u16>,
}

impl DepthFrame {
    /// Wrap a pixel buffer; `pixels.len()` must equal `width * height`
    pub fn new(width: usize, height: usize, pixels: Vec<u16>) -> Result<Self, TrackError> {
        if pixels.len() != width * height {
            return Err(TrackError::Source(format!(
                "frame buffer holds {} pixels, expected {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Depth at (x, y) in millimetres; 0 means no reading
    pub fn depth_at(&self, x: usize, y: usize) -> u16 {
        self.pixels[y * self.width + x]
    }
}

/// Pixel coordinates plus depth of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthPixel {
    pub x: usize,
    pub y: usize,
    pub depth_mm: u16,
}

/// The valid pixel closest to the sensor, or `None` when the whole frame has
/// no reading. Ties go to the first hit in row-major order.
pub fn closest_point(frame: &DepthFrame) -> Option<DepthPixel> {
    let mut nearest: Option<DepthPixel> = None;
    for y in 0..frame.height {
        for x in 0..frame.width {
            let depth_mm = frame.depth_at(x, y);
            if depth_mm == 0 {
                continue;
            }
            if nearest.map_or(true, |p| depth_mm < p.depth_mm) {
                nearest = Some(DepthPixel { x, y, depth_mm });
            }
        }
    }
    nearest
}

/// A stream of depth frames (the sensor driver boundary)
pub trait DepthSource {
    /// Produce the next frame; blocking on the sensor's cadence is allowed
    fn next_frame(&mut self) -> Result<DepthFrame, TrackError>;
}

/// Maps a depth pixel to a point in camera space (the sensor SDK boundary)
pub trait PointConverter {
    fn to_camera_space(&self, frame: &DepthFrame, pixel: DepthPixel) -> Point3;
}

/// A plain pinhole projection, good enough when the sensor SDK's own
/// converter is not available
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PinholeConverter {
    /// Horizontal field of view, degrees
    pub horizontal_fov_deg: f64,
    /// Vertical field of view, degrees
    pub vertical_fov_deg: f64,
}

impl Default for PinholeConverter {
    /// Field of view of the common structured-light depth cameras
    fn default() -> Self {
        Self {
            horizontal_fov_deg: 58.0,
            vertical_fov_deg: 45.0,
        }
    }
}

impl PointConverter for PinholeConverter {
    fn to_camera_space(&self, frame: &DepthFrame, pixel: DepthPixel) -> Point3 {
        let z = pixel.depth_mm as f64;
        let frac_x = if frame.width() > 1 {
            pixel.x as f64 / (frame.width() - 1) as f64 - 0.5
        } else {
            0.0
        };
        let frac_y = if frame.height() > 1 {
            0.5 - pixel.y as f64 / (frame.height() - 1) as f64
        } else {
            0.0
        };
        let angle_x = (frac_x * self.horizontal_fov_deg).to_radians();
        let angle_y = (frac_y * self.vertical_fov_deg).to_radians();
        Point3::new(z * angle_x.tan(), z * angle_y.tan(), z)
    }
}
