//! Optional motion constraints applied on top of the robot's own limits

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use util::maths::clamp;

use crate::kinematics::ChassisSpeeds;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Limits on the chassis motion, for example from the section of trajectory being followed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriveConstraints {
    /// Units: meters/second
    pub max_velocity_ms: f64,

    /// Units: radians/second
    pub max_angular_velocity_rads: f64,

    /// Units: meters/second^2
    pub max_acceleration_mss: f64,

    /// Units: radians/second^2
    pub max_angular_acceleration_radss: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveConstraints {
    /// Scale the linear velocity down to the maximum and clamp the angular velocity.
    pub fn limit_velocity(&self, speeds: &ChassisSpeeds) -> ChassisSpeeds {
        let mut vel = Vector2::new(speeds.vx_ms, speeds.vy_ms);
        let linear = vel.norm();

        if linear > self.max_velocity_ms {
            vel *= self.max_velocity_ms / linear;
        }

        ChassisSpeeds::new(
            vel.x,
            vel.y,
            clamp(
                &speeds.omega_rads,
                &-self.max_angular_velocity_rads,
                &self.max_angular_velocity_rads,
            ),
        )
    }

    /// Scale the linear acceleration down to the maximum and clamp the angular acceleration.
    pub fn limit_acceleration(
        &self,
        linear_mss: Vector2<f64>,
        angular_radss: f64,
    ) -> (Vector2<f64>, f64) {
        let mut accel = linear_mss;
        let norm = accel.norm();

        if norm > self.max_acceleration_mss {
            accel *= self.max_acceleration_mss / norm;
        }

        (
            accel,
            clamp(
                &angular_radss,
                &-self.max_angular_acceleration_radss,
                &self.max_angular_acceleration_radss,
            ),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn constraints() -> DriveConstraints {
        DriveConstraints {
            max_velocity_ms: 2.0,
            max_angular_velocity_rads: 1.0,
            max_acceleration_mss: 3.0,
            max_angular_acceleration_radss: 4.0,
        }
    }

    #[test]
    fn test_limit_velocity() {
        let c = constraints();

        let v = c.limit_velocity(&ChassisSpeeds::new(3.0, 4.0, -2.0));
        assert!((v.linear_speed_ms() - 2.0).abs() < 1e-12);
        assert!((v.vy_ms / v.vx_ms - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(v.omega_rads, -1.0);

        let slow = ChassisSpeeds::new(0.5, 0.5, 0.5);
        assert_eq!(c.limit_velocity(&slow), slow);
    }

    #[test]
    fn test_limit_acceleration() {
        let c = constraints();

        let (a, alpha) = c.limit_acceleration(Vector2::new(0.0, -6.0), 10.0);
        assert!((a.y + 3.0).abs() < 1e-12);
        assert_eq!(alpha, 4.0);
    }
}
