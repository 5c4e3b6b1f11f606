//! # Robot model
//!
//! Static physical description of the robot: mass, inertia, module geometry and the drive module
//! configuration. Everything the setpoint generator needs is derived once at construction, so the
//! model is immutable afterwards.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod module_config;
mod motor;
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector, Vector2};
use serde::{Deserialize, Serialize};

pub use module_config::*;
pub use motor::*;
pub use params::*;

use crate::kinematics::{
    ChassisKinematics, ChassisSpeeds, DifferentialKinematics, KinematicsError, ModuleState,
    SwerveKinematics,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Acceleration due to gravity.
///
/// Units: meters/second^2
pub const GRAVITY_MSS: f64 = 9.8;

/// Modules closer than this to the centre of rotation cannot be used by the force map.
///
/// Units: meters
const MIN_PIVOT_DISTANCE_M: f64 = 1e-6;

/// Tolerance used for singular values when inverting the force map.
const FORCE_MAP_EPS: f64 = 1e-12;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Physical model of the robot.
#[derive(Clone, Debug)]
pub struct RobotModel {
    mass_kg: f64,
    moi_kgm2: f64,
    module_config: ModuleConfig,
    module_locations_m: Vec<Vector2<f64>>,
    topology: DriveTopology,

    // ---- DERIVED ----
    module_pivot_distance_m: Vec<f64>,
    wheel_friction_force_n: f64,
    max_torque_friction_nm: f64,

    /// 2N x 3 minimum norm map from chassis force and torque to module force components.
    force_kinematics: DMatrix<f64>,

    kinematics: ChassisKinematics,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Drive topology of the chassis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveTopology {
    /// N independently steered and driven modules.
    Holonomic,

    /// A left and right side with fixed headings.
    Differential,
}

/// Errors that can occur while building a [`RobotModel`].
#[derive(Debug, thiserror::Error)]
pub enum RobotModelError {
    #[error("Expected {0} to be finite and greater than zero, found {1}")]
    NotPositive(&'static str, f64),

    #[error("A {topology:?} robot needs {expected} modules, found {found}")]
    WrongModuleCount {
        topology: DriveTopology,
        expected: usize,
        found: usize,
    },

    #[error("Module {0} is at the centre of rotation")]
    ModuleAtCentre(usize),

    #[error("Module {0} has a non-finite location")]
    NonFiniteLocation(usize),

    #[error("Unknown drive motor type \"{0}\"")]
    UnknownMotor(String),

    #[error("Each module needs at least one drive motor")]
    NoDriveMotors,

    #[error("Cannot build the chassis kinematics: {0}")]
    KinematicsError(KinematicsError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RobotModel {
    /// Create a new robot model from explicit module locations.
    ///
    /// Differential robots must have exactly two locations, left then right.
    pub fn new(
        mass_kg: f64,
        moi_kgm2: f64,
        module_config: ModuleConfig,
        module_locations_m: Vec<Vector2<f64>>,
        topology: DriveTopology,
    ) -> Result<Self, RobotModelError> {
        check_positive("mass_kg", mass_kg)?;
        check_positive("moi_kgm2", moi_kgm2)?;
        check_positive("wheel_radius_m", module_config.wheel_radius_m)?;
        check_positive("max_drive_velocity_ms", module_config.max_drive_velocity_ms)?;
        check_positive("wheel_cof", module_config.wheel_cof)?;
        check_positive("drive_current_limit_a", module_config.drive_current_limit_a)?;

        let num_modules = module_locations_m.len();

        match topology {
            DriveTopology::Differential if num_modules != 2 => {
                return Err(RobotModelError::WrongModuleCount {
                    topology,
                    expected: 2,
                    found: num_modules,
                })
            }
            DriveTopology::Holonomic if num_modules == 0 => {
                return Err(RobotModelError::WrongModuleCount {
                    topology,
                    expected: 1,
                    found: 0,
                })
            }
            _ => (),
        }

        let mut module_pivot_distance_m = Vec::with_capacity(num_modules);
        // 3 x 2N map from module force components to the chassis force and torque they produce
        let mut wrench = DMatrix::zeros(3, 2 * num_modules);

        for (i, loc) in module_locations_m.iter().enumerate() {
            if !(loc.x.is_finite() && loc.y.is_finite()) {
                return Err(RobotModelError::NonFiniteLocation(i));
            }

            let pivot = loc.norm();
            if pivot < MIN_PIVOT_DISTANCE_M {
                return Err(RobotModelError::ModuleAtCentre(i));
            }
            module_pivot_distance_m.push(pivot);

            wrench[(0, 2 * i)] = 1.0;
            wrench[(1, 2 * i + 1)] = 1.0;
            wrench[(2, 2 * i)] = -loc.y;
            wrench[(2, 2 * i + 1)] = loc.x;
        }

        let force_kinematics = wrench
            .pseudo_inverse(FORCE_MAP_EPS)
            .map_err(|e| RobotModelError::KinematicsError(KinematicsError::Singular(e)))?;

        let kinematics = match topology {
            DriveTopology::Holonomic => ChassisKinematics::Swerve(
                SwerveKinematics::new(module_locations_m.clone())
                    .map_err(RobotModelError::KinematicsError)?,
            ),
            DriveTopology::Differential => {
                let trackwidth_m = (module_locations_m[0].y - module_locations_m[1].y).abs();
                check_positive("trackwidth_m", trackwidth_m)?;
                ChassisKinematics::Differential(DifferentialKinematics::new(trackwidth_m))
            }
        };

        let wheel_friction_force_n =
            module_config.wheel_cof * (mass_kg / num_modules as f64) * GRAVITY_MSS;

        Ok(Self {
            mass_kg,
            moi_kgm2,
            module_config,
            module_locations_m,
            topology,
            module_pivot_distance_m,
            wheel_friction_force_n,
            max_torque_friction_nm: wheel_friction_force_n * module_config.wheel_radius_m,
            force_kinematics,
            kinematics,
        })
    }

    /// Create a model of a holonomic robot with four modules in a rectangle.
    ///
    /// Modules are ordered front left, front right, back left, back right.
    pub fn holonomic(
        mass_kg: f64,
        moi_kgm2: f64,
        module_config: ModuleConfig,
        trackwidth_m: f64,
        wheelbase_m: f64,
    ) -> Result<Self, RobotModelError> {
        check_positive("trackwidth_m", trackwidth_m)?;
        check_positive("wheelbase_m", wheelbase_m)?;

        let (hw, ht) = (wheelbase_m / 2.0, trackwidth_m / 2.0);

        Self::new(
            mass_kg,
            moi_kgm2,
            module_config,
            vec![
                Vector2::new(hw, ht),
                Vector2::new(hw, -ht),
                Vector2::new(-hw, ht),
                Vector2::new(-hw, -ht),
            ],
            DriveTopology::Holonomic,
        )
    }

    /// Create a model of a differential robot. Module 0 is the left side, module 1 the right.
    pub fn differential(
        mass_kg: f64,
        moi_kgm2: f64,
        module_config: ModuleConfig,
        trackwidth_m: f64,
    ) -> Result<Self, RobotModelError> {
        check_positive("trackwidth_m", trackwidth_m)?;

        Self::new(
            mass_kg,
            moi_kgm2,
            module_config,
            vec![
                Vector2::new(0.0, trackwidth_m / 2.0),
                Vector2::new(0.0, -trackwidth_m / 2.0),
            ],
            DriveTopology::Differential,
        )
    }

    pub fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    pub fn moi_kgm2(&self) -> f64 {
        self.moi_kgm2
    }

    pub fn module_config(&self) -> &ModuleConfig {
        &self.module_config
    }

    pub fn module_locations_m(&self) -> &[Vector2<f64>] {
        &self.module_locations_m
    }

    pub fn module_pivot_distance_m(&self) -> &[f64] {
        &self.module_pivot_distance_m
    }

    pub fn topology(&self) -> DriveTopology {
        self.topology
    }

    pub fn is_holonomic(&self) -> bool {
        self.topology == DriveTopology::Holonomic
    }

    pub fn num_modules(&self) -> usize {
        self.module_locations_m.len()
    }

    /// Force each wheel can apply before slipping.
    ///
    /// Units: newtons
    pub fn wheel_friction_force_n(&self) -> f64 {
        self.wheel_friction_force_n
    }

    /// Wheel torque at which the wheel starts to slip.
    ///
    /// Units: newton meters
    pub fn max_torque_friction_nm(&self) -> f64 {
        self.max_torque_friction_nm
    }

    pub fn kinematics(&self) -> &ChassisKinematics {
        &self.kinematics
    }

    pub fn to_module_states(&self, speeds: &ChassisSpeeds) -> Vec<ModuleState> {
        self.kinematics.to_module_states(speeds)
    }

    pub fn to_chassis_speeds(&self, states: &[ModuleState]) -> ChassisSpeeds {
        self.kinematics.to_chassis_speeds(states)
    }

    /// Split a chassis force and torque between the modules.
    ///
    /// `forces` carries the force in `vx_ms`/`vy_ms` (N) and the torque in `omega_rads` (N m).
    /// The returned module forces are the smallest set which sums back to the chassis force and
    /// whose moments about the centre of rotation sum back to the chassis torque. For layouts
    /// symmetric about the centre the linear force is shared evenly.
    pub fn chassis_forces_to_wheel_force_vectors(&self, forces: &ChassisSpeeds) -> Vec<Vector2<f64>> {
        let chassis =
            DVector::from_column_slice(&[forces.vx_ms, forces.vy_ms, forces.omega_rads]);
        let module_forces = &self.force_kinematics * chassis;

        (0..self.num_modules())
            .map(|i| Vector2::new(module_forces[2 * i], module_forces[2 * i + 1]))
            .collect()
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), RobotModelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RobotModelError::NotPositive(name, value))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn module_config() -> ModuleConfig {
        ModuleConfig::new(
            0.048,
            5.45,
            1.2,
            MotorType::KrakenX60.dc_motor().with_reduction(5.143),
            60.0,
            1,
        )
    }

    #[test]
    fn test_holonomic_layout() {
        let model = RobotModel::holonomic(74.0, 6.9, module_config(), 0.5, 0.6).unwrap();

        assert_eq!(model.num_modules(), 4);
        assert_eq!(model.module_locations_m()[0], Vector2::new(0.3, 0.25));
        assert_eq!(model.module_locations_m()[3], Vector2::new(-0.3, -0.25));

        let friction = 1.2 * (74.0 / 4.0) * GRAVITY_MSS;
        assert!((model.wheel_friction_force_n() - friction).abs() < 1e-9);
        assert!((model.max_torque_friction_nm() - friction * 0.048).abs() < 1e-9);
        assert!((model.module_pivot_distance_m()[1] - (0.3f64).hypot(0.25)).abs() < 1e-12);
    }

    fn wheel_sums(model: &RobotModel, forces: &[Vector2<f64>]) -> (Vector2<f64>, f64) {
        let sum = forces.iter().fold(Vector2::<f64>::zeros(), |acc, f| acc + f);
        let moment = forces
            .iter()
            .zip(model.module_locations_m())
            .map(|(f, l)| l.x * f.y - l.y * f.x)
            .sum();

        (sum, moment)
    }

    fn offset_model() -> RobotModel {
        RobotModel::new(
            50.0,
            4.0,
            module_config(),
            vec![
                Vector2::new(0.3, 0.2),
                Vector2::new(0.1, -0.4),
                Vector2::new(-0.3, 0.25),
                Vector2::new(-0.2, -0.3),
            ],
            DriveTopology::Holonomic,
        )
        .unwrap()
    }

    #[test]
    fn test_force_map_sums() {
        let model = offset_model();

        let forces = model.chassis_forces_to_wheel_force_vectors(&ChassisSpeeds::new(
            120.0, -45.0, 30.0,
        ));
        let (sum, moment) = wheel_sums(&model, &forces);
        assert!((sum.x - 120.0).abs() < 1e-9);
        assert!((sum.y + 45.0).abs() < 1e-9);
        assert!((moment - 30.0).abs() < 1e-9);

        // A pure torque gives no net linear force, even off centre
        let forces =
            model.chassis_forces_to_wheel_force_vectors(&ChassisSpeeds::new(0.0, 0.0, 30.0));
        let (sum, moment) = wheel_sums(&model, &forces);
        assert!(sum.norm() < 1e-9);
        assert!((moment - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_force_map_symmetric() {
        let model = RobotModel::holonomic(74.0, 6.9, module_config(), 0.5, 0.5).unwrap();

        // Linear force is shared evenly on a square layout
        let forces =
            model.chassis_forces_to_wheel_force_vectors(&ChassisSpeeds::new(80.0, 20.0, 0.0));
        for f in forces.iter() {
            assert!((f - Vector2::new(20.0, 5.0)).norm() < 1e-9);
        }

        // Torque becomes equal tangential forces
        let forces =
            model.chassis_forces_to_wheel_force_vectors(&ChassisSpeeds::new(0.0, 0.0, 10.0));
        let tangential = 10.0 / (4.0 * (0.25f64).hypot(0.25));
        for (f, l) in forces.iter().zip(model.module_locations_m()) {
            assert!((f.norm() - tangential).abs() < 1e-9);
            assert!(f.dot(l).abs() < 1e-9);
        }

        let diff = RobotModel::differential(60.0, 5.0, module_config(), 0.6).unwrap();
        let forces =
            diff.chassis_forces_to_wheel_force_vectors(&ChassisSpeeds::new(30.0, 0.0, 6.0));
        let (sum, moment) = wheel_sums(&diff, &forces);
        assert!((sum.x - 30.0).abs() < 1e-9);
        assert!((moment - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_differential_model() {
        let model = RobotModel::differential(60.0, 5.0, module_config(), 0.6).unwrap();
        assert_eq!(model.num_modules(), 2);
        assert!(!model.is_holonomic());

        let states = model.to_module_states(&ChassisSpeeds::new(1.0, 0.0, 1.0));
        assert!((states[0].speed_ms - 0.7).abs() < 1e-12);
        assert!((states[1].speed_ms - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_models() {
        assert!(matches!(
            RobotModel::holonomic(0.0, 6.9, module_config(), 0.5, 0.5),
            Err(RobotModelError::NotPositive("mass_kg", _))
        ));
        assert!(matches!(
            RobotModel::new(
                50.0,
                4.0,
                module_config(),
                vec![Vector2::new(0.0, 0.3)],
                DriveTopology::Differential
            ),
            Err(RobotModelError::WrongModuleCount { expected: 2, .. })
        ));
        assert!(matches!(
            RobotModel::new(
                50.0,
                4.0,
                module_config(),
                vec![Vector2::new(0.3, 0.3), Vector2::new(0.0, 0.0)],
                DriveTopology::Holonomic
            ),
            Err(RobotModelError::ModuleAtCentre(1))
        ));
    }

    #[test]
    fn test_kinematics_round_trip() {
        let model = RobotModel::holonomic(74.0, 6.9, module_config(), 0.5, 0.6).unwrap();
        let v = ChassisSpeeds::new(1.1, -0.4, 0.8);
        let rt = model.to_chassis_speeds(&model.to_module_states(&v));
        assert!(rt.epsilon_equals(&v, 1e-9));
    }
}
