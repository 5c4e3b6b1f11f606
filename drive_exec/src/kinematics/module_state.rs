//! Module state definition

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use util::maths::wrap_to_pi;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The state of a single drive module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    /// Linear speed of the wheel at the carpet.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Heading of the module in the robot frame.
    ///
    /// Units: radians
    pub angle_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ModuleState {
    pub fn new(speed_ms: f64, angle_rad: f64) -> Self {
        Self {
            speed_ms,
            angle_rad,
        }
    }

    /// Velocity of the wheel as a robot-frame (x, y) vector.
    pub fn velocity(&self) -> (f64, f64) {
        (
            self.angle_rad.cos() * self.speed_ms,
            self.angle_rad.sin() * self.speed_ms,
        )
    }

    /// The direction the wheel is actually travelling in, accounting for negative speeds.
    pub fn travel_heading(&self) -> f64 {
        if self.speed_ms < 0.0 {
            wrap_to_pi(self.angle_rad + PI)
        } else {
            wrap_to_pi(self.angle_rad)
        }
    }

    /// Return the equivalent state which requires at most 90 degrees of steering from
    /// `current_angle_rad`, reversing the drive direction if needed.
    pub fn optimized(&self, current_angle_rad: f64) -> Self {
        let delta = wrap_to_pi(self.angle_rad - current_angle_rad);

        if delta.abs() > PI / 2.0 {
            Self {
                speed_ms: -self.speed_ms,
                angle_rad: wrap_to_pi(self.angle_rad + PI),
            }
        } else {
            *self
        }
    }
}
