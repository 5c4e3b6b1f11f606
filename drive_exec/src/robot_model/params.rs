//! Parameters structure for the robot model

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Deserialize;

use super::{DcMotor, DriveTopology, ModuleConfig, MotorType, RobotModel, RobotModelError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Physical parameters of the robot, as loaded from `robot.toml`.
#[derive(Clone, Debug, Deserialize)]
pub struct RobotParams {
    /// If true the robot has independently steered modules, otherwise it is a differential
    /// drive.
    pub holonomic: bool,

    // ---- INERTIA ----
    /// Mass of the robot including battery and bumpers.
    ///
    /// Units: kilograms
    pub mass_kg: f64,

    /// Moment of inertia about the vertical axis.
    ///
    /// Units: kilogram meters^2
    pub moi_kgm2: f64,

    // ---- GEOMETRY ----
    /// Distance between the left and right wheels.
    ///
    /// Units: meters
    pub trackwidth_m: f64,

    /// Distance between the front and back wheels. Only used for holonomic robots.
    ///
    /// Units: meters
    #[serde(default)]
    pub wheelbase_m: f64,

    /// Explicit module locations for holonomic robots which do not have four modules in a
    /// rectangle. Overrides the trackwidth and wheelbase if given.
    ///
    /// Units: meters,
    /// Frame: Robot body
    #[serde(default)]
    pub module_locations_m: Option<Vec<[f64; 2]>>,

    // ---- DRIVE MODULES ----
    /// Units: meters
    pub wheel_radius_m: f64,

    /// Reduction between the drive motors and the wheel.
    pub drive_gearing: f64,

    /// Maximum linear speed of a wheel.
    ///
    /// Units: meters/second
    pub max_drive_speed_ms: f64,

    /// Coefficient of friction between the wheels and the carpet.
    pub wheel_cof: f64,

    /// Identifier of the drive motor type, for example `krakenX60`.
    pub drive_motor: String,

    /// Number of drive motors per module.
    #[serde(default = "default_num_drive_motors")]
    pub num_drive_motors: usize,

    /// Current limit of a single drive motor.
    ///
    /// Units: amps
    pub drive_current_limit_a: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RobotParams {
    /// Geared model of the drive motors of one module.
    pub fn drive_motor_model(&self) -> Result<DcMotor, RobotModelError> {
        let motor_type: MotorType = self.drive_motor.parse()?;

        Ok(motor_type
            .dc_motor()
            .with_motor_count(self.num_drive_motors)
            .with_reduction(self.drive_gearing))
    }

    /// Build the robot model described by these parameters.
    pub fn to_model(&self) -> Result<RobotModel, RobotModelError> {
        if self.num_drive_motors == 0 {
            return Err(RobotModelError::NoDriveMotors);
        }
        if !(self.drive_gearing.is_finite() && self.drive_gearing > 0.0) {
            return Err(RobotModelError::NotPositive("drive_gearing", self.drive_gearing));
        }

        let module_config = ModuleConfig::new(
            self.wheel_radius_m,
            self.max_drive_speed_ms,
            self.wheel_cof,
            self.drive_motor_model()?,
            self.drive_current_limit_a,
            self.num_drive_motors,
        );

        match (self.holonomic, &self.module_locations_m) {
            (true, Some(locs)) => RobotModel::new(
                self.mass_kg,
                self.moi_kgm2,
                module_config,
                locs.iter().map(|l| Vector2::new(l[0], l[1])).collect(),
                DriveTopology::Holonomic,
            ),
            (true, None) => RobotModel::holonomic(
                self.mass_kg,
                self.moi_kgm2,
                module_config,
                self.trackwidth_m,
                self.wheelbase_m,
            ),
            (false, _) => RobotModel::differential(
                self.mass_kg,
                self.moi_kgm2,
                module_config,
                self.trackwidth_m,
            ),
        }
    }
}

fn default_num_drive_motors() -> usize {
    1
}

#[cfg(test)]
mod test {
    use super::*;

    const SWERVE_PARAMS: &str = r#"
        holonomic = true
        mass_kg = 74.088
        moi_kgm2 = 6.883
        trackwidth_m = 0.546
        wheelbase_m = 0.546
        wheel_radius_m = 0.048
        drive_gearing = 5.143
        max_drive_speed_ms = 5.45
        wheel_cof = 1.2
        drive_motor = "krakenX60"
        drive_current_limit_a = 60.0
    "#;

    #[test]
    fn test_load_swerve() {
        let p: RobotParams = util::params::from_str(SWERVE_PARAMS).unwrap();
        assert_eq!(p.num_drive_motors, 1);

        let model = p.to_model().unwrap();
        assert_eq!(model.num_modules(), 4);
        assert_eq!(model.topology(), DriveTopology::Holonomic);
    }

    #[test]
    fn test_explicit_locations() {
        let src = format!(
            "{}\nmodule_locations_m = [[0.3, 0.0], [-0.15, 0.26], [-0.15, -0.26]]\n",
            SWERVE_PARAMS
        );
        let p: RobotParams = util::params::from_str(&src).unwrap();
        let model = p.to_model().unwrap();
        assert_eq!(model.num_modules(), 3);
    }

    #[test]
    fn test_unknown_motor() {
        let src = SWERVE_PARAMS.replace("krakenX60", "hamsterWheel");
        let p: RobotParams = util::params::from_str(&src).unwrap();
        assert!(matches!(
            p.to_model(),
            Err(RobotModelError::UnknownMotor(ref m)) if m == "hamsterWheel"
        ));
    }

    #[test]
    fn test_bad_geometry() {
        let src = SWERVE_PARAMS.replace("trackwidth_m = 0.546", "trackwidth_m = -0.5");
        let p: RobotParams = util::params::from_str(&src).unwrap();
        assert!(matches!(
            p.to_model(),
            Err(RobotModelError::NotPositive("trackwidth_m", _))
        ));
    }
}
