//! Parameters structure for the setpoint generator

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use super::DriveConstraints;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the setpoint generator, as loaded from `setpoint_gen.toml`.
#[derive(Clone, Debug, Deserialize)]
pub struct SetpointGenParams {
    /// Maximum rotation rate of a module's steering.
    ///
    /// Units: radians/second
    pub max_steer_rate_rads: f64,

    /// Supply voltages below this are treated as this value.
    ///
    /// Units: volts
    #[serde(default = "default_brownout_voltage_v")]
    pub brownout_voltage_v: f64,

    /// Supply voltage assumed when no measurement is available.
    ///
    /// Units: volts
    #[serde(default = "default_nominal_voltage_v")]
    pub nominal_voltage_v: f64,

    /// Optional limits on the chassis motion in addition to the robot's own.
    #[serde(default)]
    pub constraints: Option<DriveConstraints>,
}

fn default_brownout_voltage_v() -> f64 {
    6.75
}

fn default_nominal_voltage_v() -> f64 {
    12.0
}
