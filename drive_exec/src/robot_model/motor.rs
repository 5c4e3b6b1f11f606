//! DC motor model and presets

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::RobotModelError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Linear model of a brushed or brushless DC motor.
///
/// The model relates current, torque, speed and voltage through three constants derived from the
/// motor's datasheet values: the winding resistance, the velocity constant and the torque
/// constant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DcMotor {
    /// Voltage at which the datasheet values were measured.
    ///
    /// Units: volts
    pub nominal_voltage_v: f64,

    /// Units: newton meters
    pub stall_torque_nm: f64,

    /// Units: amps
    pub stall_current_a: f64,

    /// Units: amps
    pub free_current_a: f64,

    /// Units: radians/second
    pub free_speed_rads: f64,

    /// Winding resistance.
    ///
    /// Units: ohms
    pub r_ohms: f64,

    /// Velocity constant.
    ///
    /// Units: radians/second/volt
    pub kv_radspv: f64,

    /// Torque constant.
    ///
    /// Units: newton meters/amp
    pub kt_nmpa: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Drive motors with a known datasheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotorType {
    #[serde(rename = "krakenX60")]
    KrakenX60,
    #[serde(rename = "krakenX60FOC")]
    KrakenX60Foc,
    #[serde(rename = "falcon500")]
    Falcon500,
    #[serde(rename = "falcon500FOC")]
    Falcon500Foc,
    #[serde(rename = "vortex")]
    Vortex,
    #[serde(rename = "NEO")]
    Neo,
    #[serde(rename = "NEO550")]
    Neo550,
    #[serde(rename = "CIM")]
    Cim,
    #[serde(rename = "miniCIM")]
    MiniCim,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DcMotor {
    /// Create a motor model from its datasheet values.
    pub fn new(
        nominal_voltage_v: f64,
        stall_torque_nm: f64,
        stall_current_a: f64,
        free_current_a: f64,
        free_speed_rads: f64,
    ) -> Self {
        let r_ohms = nominal_voltage_v / stall_current_a;

        Self {
            nominal_voltage_v,
            stall_torque_nm,
            stall_current_a,
            free_current_a,
            free_speed_rads,
            r_ohms,
            kv_radspv: free_speed_rads / (nominal_voltage_v - r_ohms * free_current_a),
            kt_nmpa: stall_torque_nm / stall_current_a,
        }
    }

    /// Create a motor model with the free speed given in revolutions per minute.
    pub fn from_rpm(
        nominal_voltage_v: f64,
        stall_torque_nm: f64,
        stall_current_a: f64,
        free_current_a: f64,
        free_speed_rpm: f64,
    ) -> Self {
        Self::new(
            nominal_voltage_v,
            stall_torque_nm,
            stall_current_a,
            free_current_a,
            free_speed_rpm * std::f64::consts::TAU / 60.0,
        )
    }

    /// Current drawn when spinning at `speed_rads` with `voltage_v` applied.
    pub fn current_at(&self, speed_rads: f64, voltage_v: f64) -> f64 {
        -speed_rads / (self.kv_radspv * self.r_ohms) + voltage_v / self.r_ohms
    }

    /// Torque produced by the given current.
    pub fn torque(&self, current_a: f64) -> f64 {
        self.kt_nmpa * current_a
    }

    /// Current needed to produce the given torque.
    pub fn current_for_torque(&self, torque_nm: f64) -> f64 {
        torque_nm / self.kt_nmpa
    }

    /// The motor as seen through a reduction of `gearing` (input turns per output turn).
    pub fn with_reduction(&self, gearing: f64) -> Self {
        Self::new(
            self.nominal_voltage_v,
            self.stall_torque_nm * gearing,
            self.stall_current_a,
            self.free_current_a,
            self.free_speed_rads / gearing,
        )
    }

    /// `count` identical motors ganged together on the same output.
    pub fn with_motor_count(&self, count: usize) -> Self {
        let n = count as f64;

        Self::new(
            self.nominal_voltage_v,
            self.stall_torque_nm * n,
            self.stall_current_a * n,
            self.free_current_a * n,
            self.free_speed_rads,
        )
    }
}

impl MotorType {
    pub const ALL: [MotorType; 9] = [
        MotorType::KrakenX60,
        MotorType::KrakenX60Foc,
        MotorType::Falcon500,
        MotorType::Falcon500Foc,
        MotorType::Vortex,
        MotorType::Neo,
        MotorType::Neo550,
        MotorType::Cim,
        MotorType::MiniCim,
    ];

    /// Identifier used for this motor in parameter files.
    pub fn id(&self) -> &'static str {
        match self {
            MotorType::KrakenX60 => "krakenX60",
            MotorType::KrakenX60Foc => "krakenX60FOC",
            MotorType::Falcon500 => "falcon500",
            MotorType::Falcon500Foc => "falcon500FOC",
            MotorType::Vortex => "vortex",
            MotorType::Neo => "NEO",
            MotorType::Neo550 => "NEO550",
            MotorType::Cim => "CIM",
            MotorType::MiniCim => "miniCIM",
        }
    }

    /// Datasheet model of a single motor of this type.
    pub fn dc_motor(&self) -> DcMotor {
        match self {
            MotorType::KrakenX60 => DcMotor::from_rpm(12.0, 7.09, 366.0, 2.0, 6000.0),
            MotorType::KrakenX60Foc => DcMotor::from_rpm(12.0, 9.37, 483.0, 2.0, 5800.0),
            MotorType::Falcon500 => DcMotor::from_rpm(12.0, 4.69, 257.0, 1.5, 6380.0),
            MotorType::Falcon500Foc => DcMotor::from_rpm(12.0, 5.84, 304.0, 1.5, 6080.0),
            MotorType::Vortex => DcMotor::from_rpm(12.0, 3.60, 211.0, 3.6, 6784.0),
            MotorType::Neo => DcMotor::from_rpm(12.0, 2.6, 105.0, 1.8, 5676.0),
            MotorType::Neo550 => DcMotor::from_rpm(12.0, 0.97, 100.0, 1.4, 11000.0),
            MotorType::Cim => DcMotor::from_rpm(12.0, 2.42, 133.0, 2.7, 5310.0),
            MotorType::MiniCim => DcMotor::from_rpm(12.0, 1.41, 89.0, 3.0, 5840.0),
        }
    }
}

impl FromStr for MotorType {
    type Err = RobotModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MotorType::ALL
            .iter()
            .find(|m| m.id() == s)
            .copied()
            .ok_or_else(|| RobotModelError::UnknownMotor(s.to_string()))
    }
}

impl fmt::Display for MotorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_motor_identities() {
        let m = MotorType::KrakenX60.dc_motor();

        // Stalled at nominal voltage draws the stall current and produces the stall torque
        let stall_current = m.current_at(0.0, m.nominal_voltage_v);
        assert!((stall_current - m.stall_current_a).abs() < 1e-9);
        assert!((m.torque(stall_current) - m.stall_torque_nm).abs() < 1e-9);

        // Running free at nominal voltage draws the free current
        let free_current = m.current_at(m.free_speed_rads, m.nominal_voltage_v);
        assert!((free_current - m.free_current_a).abs() < 1e-9);

        // Torque and current conversions are inverse
        assert!((m.current_for_torque(m.torque(42.0)) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_reduction_and_count() {
        let m = MotorType::Neo.dc_motor();
        let geared = m.with_reduction(6.75);

        assert!((geared.stall_torque_nm - m.stall_torque_nm * 6.75).abs() < 1e-12);
        assert!((geared.free_speed_rads - m.free_speed_rads / 6.75).abs() < 1e-12);
        assert_eq!(geared.stall_current_a, m.stall_current_a);

        let pair = m.with_motor_count(2);
        assert!((pair.stall_torque_nm - 2.0 * m.stall_torque_nm).abs() < 1e-12);
        assert!((pair.stall_current_a - 2.0 * m.stall_current_a).abs() < 1e-12);
        assert!((pair.free_current_a - 2.0 * m.free_current_a).abs() < 1e-12);
        // Torque per amp is unchanged by ganging motors
        assert!((pair.kt_nmpa - m.kt_nmpa).abs() < 1e-12);
    }

    #[test]
    fn test_motor_ids() {
        for m in MotorType::ALL.iter() {
            assert_eq!(m.id().parse::<MotorType>().unwrap(), *m);
        }

        assert!(matches!(
            "turboEncabulator".parse::<MotorType>(),
            Err(RobotModelError::UnknownMotor(_))
        ));
    }
}
