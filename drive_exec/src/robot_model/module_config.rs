//! Drive module configuration

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

use super::DcMotor;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Supply voltage used to characterise the drive losses.
pub const NOMINAL_VOLTAGE_V: f64 = 12.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Configuration of one drive module, either a swerve module or one side of a differential
/// chassis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ModuleConfig {
    /// Units: meters
    pub wheel_radius_m: f64,

    /// Maximum linear speed of the wheel at the carpet.
    ///
    /// Units: meters/second
    pub max_drive_velocity_ms: f64,

    /// Coefficient of friction between the wheel and the carpet.
    pub wheel_cof: f64,

    /// Model of the drive motors of the module, with the gearing and motor count applied.
    pub drive_motor: DcMotor,

    /// Current limit of all drive motors of the module combined.
    ///
    /// Units: amps
    pub drive_current_limit_a: f64,

    /// Maximum angular speed of the wheel.
    ///
    /// Units: radians/second
    pub max_drive_velocity_rads: f64,

    /// Torque lost to friction in the drivetrain, estimated as the torque needed to hold the
    /// module at its maximum speed.
    ///
    /// Units: newton meters
    pub torque_loss_nm: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ModuleConfig {
    /// Create a new module configuration.
    ///
    /// `drive_motor` must already include the gear reduction and motor count, while
    /// `drive_current_limit_a` is the limit of a single motor.
    pub fn new(
        wheel_radius_m: f64,
        max_drive_velocity_ms: f64,
        wheel_cof: f64,
        drive_motor: DcMotor,
        drive_current_limit_a: f64,
        num_motors: usize,
    ) -> Self {
        let drive_current_limit_a = drive_current_limit_a * num_motors as f64;
        let max_drive_velocity_rads = max_drive_velocity_ms / wheel_radius_m;

        let loss_current = drive_motor
            .current_at(max_drive_velocity_rads, NOMINAL_VOLTAGE_V)
            .min(drive_current_limit_a);

        Self {
            wheel_radius_m,
            max_drive_velocity_ms,
            wheel_cof,
            drive_motor,
            drive_current_limit_a,
            max_drive_velocity_rads,
            torque_loss_nm: drive_motor.torque(loss_current),
        }
    }
}
