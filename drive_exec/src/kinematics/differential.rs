//! Differential kinematics

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use super::{ChassisSpeeds, ModuleState};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Kinematics of a chassis with a left and right side which cannot steer.
///
/// Module 0 is the left side and module 1 the right side. Both always have a heading of zero.
#[derive(Clone, Copy, Debug)]
pub struct DifferentialKinematics {
    /// Distance between the left and right wheels.
    ///
    /// Units: meters
    pub trackwidth_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DifferentialKinematics {
    pub fn new(trackwidth_m: f64) -> Self {
        Self { trackwidth_m }
    }

    /// Convert chassis speeds into left and right side states. Lateral velocity is ignored.
    pub fn to_module_states(&self, speeds: &ChassisSpeeds) -> [ModuleState; 2] {
        let half_track = self.trackwidth_m / 2.0;

        [
            ModuleState::new(speeds.vx_ms - speeds.omega_rads * half_track, 0.0),
            ModuleState::new(speeds.vx_ms + speeds.omega_rads * half_track, 0.0),
        ]
    }

    /// Convert left and right side states into chassis speeds.
    pub fn to_chassis_speeds(&self, states: &[ModuleState]) -> ChassisSpeeds {
        let left = states.get(0).map(|s| s.velocity().0).unwrap_or(0.0);
        let right = states.get(1).map(|s| s.velocity().0).unwrap_or(0.0);

        ChassisSpeeds::new(
            (left + right) / 2.0,
            0.0,
            (right - left) / self.trackwidth_m,
        )
    }
}
