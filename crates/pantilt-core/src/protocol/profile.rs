//! Device tuning data
//!
//! Resolution constants and scripted-sequence parameters are device-specific
//! data, not algorithm. They live here as named fields so the engine stays
//! device-agnostic even though only one unit is targeted today.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::commands::Joint;

/// Tuning constants for one pan-tilt unit model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Pan axis resolution in arc-seconds per encoder tick
    pub pan_resolution_arcsec: f64,
    /// Tilt axis resolution in arc-seconds per encoder tick
    pub tilt_resolution_arcsec: f64,
    /// Lower tilt target of the zeroing sweep, degrees
    pub tilt_sweep_min_deg: f64,
    /// Upper tilt target of the zeroing sweep, degrees
    pub tilt_sweep_max_deg: f64,
    /// Delay between scripted zero-sequence commands
    pub settle_delay: Duration,
    /// How long to wait for a confirmation or position reply
    pub response_timeout: Duration,
    /// Sleep between polls while awaiting a reply
    pub poll_interval: Duration,
}

impl Default for DeviceProfile {
    /// Values for the PTU-46 class of units (185.1428 arc-seconds per tick)
    fn default() -> Self {
        Self {
            pan_resolution_arcsec: 185.1428,
            tilt_resolution_arcsec: 185.1428,
            tilt_sweep_min_deg: -45.0,
            tilt_sweep_max_deg: 30.0,
            settle_delay: Duration::from_millis(500),
            response_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(5),
        }
    }
}

impl DeviceProfile {
    /// Resolution of the given joint, arc-seconds per tick
    pub fn resolution_arcsec(&self, joint: Joint) -> f64 {
        match joint {
            Joint::Pan => self.pan_resolution_arcsec,
            Joint::Tilt => self.tilt_resolution_arcsec,
        }
    }
}
