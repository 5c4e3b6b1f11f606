//! Chassis speeds definition

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::maths::epsilon_equals;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Velocity of the whole chassis in the robot frame.
///
/// The same structure is also used to carry chassis accelerations and chassis forces, where the
/// linear terms become N (or m/s^2) and the angular term becomes N m (or rad/s^2).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisSpeeds {
    /// Forward velocity.
    ///
    /// Units: meters/second
    pub vx_ms: f64,

    /// Leftward velocity.
    ///
    /// Units: meters/second
    pub vy_ms: f64,

    /// Anticlockwise angular velocity.
    ///
    /// Units: radians/second
    pub omega_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChassisSpeeds {
    pub fn new(vx_ms: f64, vy_ms: f64, omega_rads: f64) -> Self {
        Self {
            vx_ms,
            vy_ms,
            omega_rads,
        }
    }

    /// Magnitude of the linear velocity.
    pub fn linear_speed_ms(&self) -> f64 {
        self.vx_ms.hypot(self.vy_ms)
    }

    /// Return true if every component is within `eps` of the matching component of `other`.
    pub fn epsilon_equals(&self, other: &Self, eps: f64) -> bool {
        epsilon_equals(self.vx_ms, other.vx_ms, eps)
            && epsilon_equals(self.vy_ms, other.vy_ms, eps)
            && epsilon_equals(self.omega_rads, other.omega_rads, eps)
    }

    /// Discretize the speeds over a period of `dt_s`.
    ///
    /// Holding a constant angular rate for the whole period sweeps the linear velocity vector
    /// around, so the robot would not end up where the continuous speeds point. The returned
    /// speeds are the twist which, integrated over `dt_s`, reaches the pose that the continuous
    /// speeds describe.
    pub fn discretize(&self, dt_s: f64) -> Self {
        let dx = self.vx_ms * dt_s;
        let dy = self.vy_ms * dt_s;
        let dtheta = self.omega_rads * dt_s;

        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = dtheta.cos() - 1.0;

        let half_theta_by_tan = if cos_minus_one.abs() < 1e-9 {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        let twist_dx = dx * half_theta_by_tan + dy * half_dtheta;
        let twist_dy = -dx * half_dtheta + dy * half_theta_by_tan;

        Self {
            vx_ms: twist_dx / dt_s,
            vy_ms: twist_dy / dt_s,
            omega_rads: dtheta / dt_s,
        }
    }
}
