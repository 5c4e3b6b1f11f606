//! Setpoint and drive feedforward definitions

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::maths::lerp;

use crate::{
    kinematics::{ChassisSpeeds, ModuleState},
    robot_model::RobotModel,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Drive command for one control cycle.
///
/// The caller keeps the latest setpoint and passes it back to the generator on the next cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Setpoint {
    /// Chassis speeds in the robot frame.
    pub robot_relative_speeds: ChassisSpeeds,

    /// State of each module, in the same order as the robot model's module locations.
    pub module_states: Vec<ModuleState>,

    /// Actuator feedforwards for each module.
    pub feedforwards: DriveFeedforwards,
}

/// Per-module feedforwards, one entry per module in each array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveFeedforwards {
    /// Units: meters/second^2
    pub accelerations_mss: Vec<f64>,

    /// Force along the module's heading.
    ///
    /// Units: newtons
    pub linear_forces_n: Vec<f64>,

    /// Drive motor current producing the linear force.
    ///
    /// Units: amps
    pub torque_currents_a: Vec<f64>,

    /// Units: newtons,
    /// Frame: Robot body
    pub robot_relative_forces_x_n: Vec<f64>,

    /// Units: newtons,
    /// Frame: Robot body
    pub robot_relative_forces_y_n: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Symmetry of the field, used when flipping a trajectory to the other alliance's side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSymmetry {
    /// The field is mirrored about the centre line, so left and right swap.
    Mirrored,

    /// The field is rotated 180 degrees about its centre, so the robot's frame is unchanged.
    Rotational,
}

/// Errors that can occur while manipulating feedforwards.
#[derive(Debug, thiserror::Error)]
pub enum FeedforwardError {
    #[error("Feedforwards can only be reversed for differential drives (2 modules), found {0} values")]
    ReverseNotDifferential(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Setpoint {
    /// The setpoint of a robot at rest, with every module pointing forwards.
    pub fn starting(model: &RobotModel) -> Self {
        let n = model.num_modules();

        Self {
            robot_relative_speeds: ChassisSpeeds::default(),
            module_states: vec![ModuleState::default(); n],
            feedforwards: DriveFeedforwards::zeros(n),
        }
    }
}

impl DriveFeedforwards {
    /// Feedforwards of zero for `num_modules` modules.
    pub fn zeros(num_modules: usize) -> Self {
        Self {
            accelerations_mss: vec![0.0; num_modules],
            linear_forces_n: vec![0.0; num_modules],
            torque_currents_a: vec![0.0; num_modules],
            robot_relative_forces_x_n: vec![0.0; num_modules],
            robot_relative_forces_y_n: vec![0.0; num_modules],
        }
    }

    pub fn num_modules(&self) -> usize {
        self.accelerations_mss.len()
    }

    /// Linearly interpolate between these feedforwards (`t = 0`) and `end` (`t = 1`).
    pub fn interpolate(&self, end: &Self, t: f64) -> Self {
        Self {
            accelerations_mss: interp(&self.accelerations_mss, &end.accelerations_mss, t),
            linear_forces_n: interp(&self.linear_forces_n, &end.linear_forces_n, t),
            torque_currents_a: interp(&self.torque_currents_a, &end.torque_currents_a, t),
            robot_relative_forces_x_n: interp(
                &self.robot_relative_forces_x_n,
                &end.robot_relative_forces_x_n,
                t,
            ),
            robot_relative_forces_y_n: interp(
                &self.robot_relative_forces_y_n,
                &end.robot_relative_forces_y_n,
                t,
            ),
        }
    }

    /// Feedforwards for driving the same path backwards with a differential drive.
    ///
    /// Driving backwards swaps the left and right sides and negates every term.
    pub fn reverse(&self) -> Result<Self, FeedforwardError> {
        let lengths = [
            self.accelerations_mss.len(),
            self.linear_forces_n.len(),
            self.torque_currents_a.len(),
            self.robot_relative_forces_x_n.len(),
            self.robot_relative_forces_y_n.len(),
        ];
        if let Some(&len) = lengths.iter().find(|&&len| len != 2) {
            return Err(FeedforwardError::ReverseNotDifferential(len));
        }

        Ok(Self {
            accelerations_mss: rev(&self.accelerations_mss),
            linear_forces_n: rev(&self.linear_forces_n),
            torque_currents_a: rev(&self.torque_currents_a),
            robot_relative_forces_x_n: rev(&self.robot_relative_forces_x_n),
            robot_relative_forces_y_n: rev(&self.robot_relative_forces_y_n),
        })
    }

    /// Feedforwards for the same motion on the other side of the field.
    ///
    /// With mirrored symmetry left and right modules swap (FL/FR and BL/BR for four modules, L/R
    /// for two) and the lateral forces change sign. Other module counts are not reordered.
    pub fn flip(&self, symmetry: FieldSymmetry) -> Self {
        match symmetry {
            FieldSymmetry::Rotational => self.clone(),
            FieldSymmetry::Mirrored => {
                Self {
                    accelerations_mss: swap(&self.accelerations_mss),
                    linear_forces_n: swap(&self.linear_forces_n),
                    torque_currents_a: swap(&self.torque_currents_a),
                    robot_relative_forces_x_n: swap(&self.robot_relative_forces_x_n),
                    robot_relative_forces_y_n: swap(&self.robot_relative_forces_y_n)
                        .into_iter()
                        .map(|f| -f)
                        .collect(),
                }
            }
        }
    }
}

fn interp(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    a.iter().zip(b.iter()).map(|(a, b)| lerp(*a, *b, t)).collect()
}

fn rev(v: &[f64]) -> Vec<f64> {
    vec![-v[1], -v[0]]
}

fn swap(v: &[f64]) -> Vec<f64> {
    match v.len() {
        4 => vec![v[1], v[0], v[3], v[2]],
        2 => vec![v[1], v[0]],
        _ => v.to_vec(),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
