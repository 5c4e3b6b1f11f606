//! # Drive control module
//!
//! Cyclic module wrapping the [`SetpointGen`]. Drive control keeps the latest setpoint between
//! cycles, so callers only provide the desired chassis speeds each cycle.
//!
//! When run within a session the chassis setpoint and the per-module states are archived to
//! `drive_ctrl/chassis.csv` and `drive_ctrl/modules.csv`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::{Session, SessionError},
};

use crate::{
    kinematics::ChassisSpeeds,
    robot_model::{RobotModelError, RobotParams},
    setpoint_gen::{GenReport, Setpoint, SetpointGen, SetpointGenError, SetpointGenParams},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters needed to initialise drive control.
#[derive(Clone, Debug, Deserialize)]
pub struct DriveCtrlParams {
    pub robot: RobotParams,
    pub setpoint_gen: SetpointGenParams,
}

/// Drive control module state
pub struct DriveCtrl {
    gen: SetpointGen,

    setpoint: Setpoint,
    report: GenReport,
    last_input: Option<InputData>,

    archiving: bool,
    arch_chassis: Archiver,
    arch_modules: Archiver,
}

/// Input data to drive control.
#[derive(Clone, Copy, Debug)]
pub struct InputData {
    /// Time of this cycle, used to stamp the archives.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Chassis speeds the drive should track.
    pub desired: ChassisSpeeds,

    /// Units: seconds
    pub dt_s: f64,

    /// Measured supply voltage, or NaN if unknown.
    ///
    /// Units: volts
    pub input_voltage_v: f64,
}

/// Archive record of one cycle's chassis setpoint.
#[derive(Serialize)]
struct ChassisRecord {
    time_s: f64,
    desired_vx_ms: f64,
    desired_vy_ms: f64,
    desired_omega_rads: f64,
    vx_ms: f64,
    vy_ms: f64,
    omega_rads: f64,
    interp_s: f64,
    full_stop: bool,
    chassis_flip: bool,
    steer_limited: bool,
    drive_limited: bool,
    input_voltage_v: f64,
}

/// Archive record of one module on one cycle.
#[derive(Serialize)]
struct ModuleRecord {
    time_s: f64,
    module: usize,
    speed_ms: f64,
    angle_rad: f64,
    accel_mss: f64,
    linear_force_n: f64,
    torque_current_a: f64,
    force_x_n: f64,
    force_y_n: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DriveCtrlInitError {
    #[error("Invalid robot model: {0}")]
    RobotModelError(RobotModelError),

    #[error("Invalid setpoint generator parameters: {0}")]
    SetpointGenError(SetpointGenError),

    #[error("Could not create the archive directory: {0}")]
    ArchDirError(SessionError),

    #[error("Could not create the archives: {0}")]
    ArchiveError(ArchiveError),
}

#[derive(Debug, Error)]
pub enum DriveCtrlError {
    #[error("Could not generate a setpoint: {0}")]
    SetpointGenError(SetpointGenError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl State for DriveCtrl {
    type InitData = DriveCtrlParams;
    type InitError = DriveCtrlInitError;

    type InputData = InputData;
    type OutputData = Setpoint;
    type StatusReport = GenReport;
    type ProcError = DriveCtrlError;

    /// Initialise drive control, setting up the archives if a session is given.
    fn init(init_data: Self::InitData, session: Option<&Session>) -> Result<Self, Self::InitError> {
        let model = init_data
            .robot
            .to_model()
            .map_err(DriveCtrlInitError::RobotModelError)?;

        info!(
            "Robot model: {} modules, {:?}, {:.1} kg",
            model.num_modules(),
            model.topology(),
            model.mass_kg()
        );

        let gen = SetpointGen::init(model, &init_data.setpoint_gen)
            .map_err(DriveCtrlInitError::SetpointGenError)?;
        let setpoint = Setpoint::starting(gen.model());

        let (archiving, arch_chassis, arch_modules) = match session {
            Some(s) => {
                let dir = s
                    .module_arch_dir("drive_ctrl")
                    .map_err(DriveCtrlInitError::ArchDirError)?;

                (
                    true,
                    Archiver::from_file_path(dir.join("chassis.csv"))
                        .map_err(DriveCtrlInitError::ArchiveError)?,
                    Archiver::from_file_path(dir.join("modules.csv"))
                        .map_err(DriveCtrlInitError::ArchiveError)?,
                )
            }
            None => (false, Archiver::default(), Archiver::default()),
        };

        Ok(Self {
            gen,
            setpoint,
            report: GenReport::default(),
            last_input: None,
            archiving,
            arch_chassis,
            arch_modules,
        })
    }

    /// Generate the next setpoint towards the desired speeds.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let (setpoint, report) = self
            .gen
            .generate_report(
                &self.setpoint,
                &input_data.desired,
                self.gen.constraints(),
                input_data.dt_s,
                input_data.input_voltage_v,
            )
            .map_err(DriveCtrlError::SetpointGenError)?;

        if report.chassis_flip {
            debug!("Chassis flip at {:.3} s", input_data.time_s);
        }

        self.setpoint = setpoint.clone();
        self.report = report;
        self.last_input = Some(*input_data);

        Ok((setpoint, report))
    }
}

impl Archived for DriveCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let input = match (self.archiving, self.last_input) {
            (true, Some(i)) => i,
            _ => return Ok(()),
        };

        let sp = &self.setpoint;
        let ff = &sp.feedforwards;

        self.arch_chassis.serialise(ChassisRecord {
            time_s: input.time_s,
            desired_vx_ms: input.desired.vx_ms,
            desired_vy_ms: input.desired.vy_ms,
            desired_omega_rads: input.desired.omega_rads,
            vx_ms: sp.robot_relative_speeds.vx_ms,
            vy_ms: sp.robot_relative_speeds.vy_ms,
            omega_rads: sp.robot_relative_speeds.omega_rads,
            interp_s: self.report.interp_s,
            full_stop: self.report.full_stop,
            chassis_flip: self.report.chassis_flip,
            steer_limited: self.report.steer_limited,
            drive_limited: self.report.drive_limited,
            input_voltage_v: self.report.input_voltage_v,
        })?;

        for (m, state) in sp.module_states.iter().enumerate() {
            self.arch_modules.serialise(ModuleRecord {
                time_s: input.time_s,
                module: m,
                speed_ms: state.speed_ms,
                angle_rad: state.angle_rad,
                accel_mss: ff.accelerations_mss[m],
                linear_force_n: ff.linear_forces_n[m],
                torque_current_a: ff.torque_currents_a[m],
                force_x_n: ff.robot_relative_forces_x_n[m],
                force_y_n: ff.robot_relative_forces_y_n[m],
            })?;
        }

        Ok(())
    }
}

impl DriveCtrl {
    /// The latest setpoint.
    pub fn setpoint(&self) -> &Setpoint {
        &self.setpoint
    }

    pub fn setpoint_gen(&self) -> &SetpointGen {
        &self.gen
    }

    /// Return to the setpoint of a robot at rest.
    pub fn reset(&mut self) {
        self.setpoint = Setpoint::starting(self.gen.model());
        self.report = GenReport::default();
        self.last_input = None;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
