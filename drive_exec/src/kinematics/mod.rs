//! # Chassis kinematics
//!
//! Conversion between whole-chassis velocities ([`ChassisSpeeds`]) and per-module states
//! ([`ModuleState`]) for the two supported drive topologies:
//!
//! - [`SwerveKinematics`] - any number of independently steered and driven modules.
//! - [`DifferentialKinematics`] - a left and right side with fixed headings.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod chassis;
mod differential;
mod module_state;
mod swerve;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

pub use chassis::*;
pub use differential::*;
pub use module_state::*;
pub use swerve::*;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors that can occur while building the kinematics.
#[derive(Debug, thiserror::Error)]
pub enum KinematicsError {
    #[error("At least one module location is required")]
    NoModules,

    #[error("Cannot compute the forward kinematics: {0}")]
    Singular(&'static str),
}

/// Kinematics for one of the supported drive topologies.
#[derive(Clone, Debug)]
pub enum ChassisKinematics {
    Swerve(SwerveKinematics),
    Differential(DifferentialKinematics),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChassisKinematics {
    /// Number of modules (or sides) described by these kinematics.
    pub fn num_modules(&self) -> usize {
        match self {
            ChassisKinematics::Swerve(k) => k.num_modules(),
            ChassisKinematics::Differential(_) => 2,
        }
    }

    /// Convert chassis speeds into module states.
    pub fn to_module_states(&self, speeds: &ChassisSpeeds) -> Vec<ModuleState> {
        match self {
            ChassisKinematics::Swerve(k) => k.to_module_states(speeds),
            ChassisKinematics::Differential(k) => k.to_module_states(speeds).to_vec(),
        }
    }

    /// Convert module states back into chassis speeds.
    ///
    /// For differential kinematics only the first two states are used.
    pub fn to_chassis_speeds(&self, states: &[ModuleState]) -> ChassisSpeeds {
        match self {
            ChassisKinematics::Swerve(k) => k.to_chassis_speeds(states),
            ChassisKinematics::Differential(k) => k.to_chassis_speeds(states),
        }
    }
}

/// Scale all module speeds uniformly so that none of them exceeds `max_speed_ms` in magnitude.
///
/// Module headings are unchanged, so the direction of the chassis motion is preserved.
pub fn desaturate_wheel_speeds(states: &mut [ModuleState], max_speed_ms: f64) {
    let real_max = states
        .iter()
        .map(|s| s.speed_ms.abs())
        .fold(0.0, f64::max);

    if real_max > max_speed_ms {
        let scale = max_speed_ms / real_max;
        for s in states.iter_mut() {
            s.speed_ms *= scale;
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
