//! Swerve (holonomic) kinematics

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector, Vector2};

use super::{ChassisSpeeds, KinematicsError, ModuleState};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Tolerance used for singular values when computing the forward kinematics.
const PSEUDO_INVERSE_EPS: f64 = 1e-12;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Kinematics of a chassis with independently steered and driven modules.
#[derive(Clone, Debug)]
pub struct SwerveKinematics {
    /// Module locations relative to the centre of rotation.
    ///
    /// Units: meters,
    /// Frame: Robot body
    locations_m: Vec<Vector2<f64>>,

    /// 2N x 3 matrix mapping chassis speeds to module velocity components.
    inverse: DMatrix<f64>,

    /// 3 x 2N least squares inverse of `inverse`.
    forward: DMatrix<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SwerveKinematics {
    /// Build the kinematics for the given module locations.
    pub fn new(locations_m: Vec<Vector2<f64>>) -> Result<Self, KinematicsError> {
        if locations_m.is_empty() {
            return Err(KinematicsError::NoModules);
        }

        let n = locations_m.len();
        let mut inverse = DMatrix::zeros(2 * n, 3);

        for (i, loc) in locations_m.iter().enumerate() {
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -loc.y;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = loc.x;
        }

        let forward = inverse
            .clone()
            .pseudo_inverse(PSEUDO_INVERSE_EPS)
            .map_err(KinematicsError::Singular)?;

        Ok(Self {
            locations_m,
            inverse,
            forward,
        })
    }

    pub fn num_modules(&self) -> usize {
        self.locations_m.len()
    }

    pub fn locations_m(&self) -> &[Vector2<f64>] {
        &self.locations_m
    }

    /// Convert chassis speeds into the state of each module.
    pub fn to_module_states(&self, speeds: &ChassisSpeeds) -> Vec<ModuleState> {
        let chassis = DVector::from_column_slice(&[speeds.vx_ms, speeds.vy_ms, speeds.omega_rads]);
        let module_vels = &self.inverse * chassis;

        (0..self.num_modules())
            .map(|i| {
                let vx = module_vels[2 * i];
                let vy = module_vels[2 * i + 1];
                ModuleState::new(vx.hypot(vy), vy.atan2(vx))
            })
            .collect()
    }

    /// Best fit chassis speeds for the given module states.
    pub fn to_chassis_speeds(&self, states: &[ModuleState]) -> ChassisSpeeds {
        let mut module_vels = DVector::zeros(2 * self.num_modules());

        for (i, s) in states.iter().take(self.num_modules()).enumerate() {
            let (vx, vy) = s.velocity();
            module_vels[2 * i] = vx;
            module_vels[2 * i + 1] = vy;
        }

        let chassis = &self.forward * module_vels;

        ChassisSpeeds::new(chassis[0], chassis[1], chassis[2])
    }
}
