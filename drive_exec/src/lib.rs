//! # Drive library.
//!
//! This library contains the drive control modules used by `drive_exec`: the physical robot
//! model, chassis kinematics, the constrained setpoint generator and the trajectory event
//! scheduler.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Drive control module - wraps the setpoint generator as a cyclic module with archiving
pub mod drive_ctrl;

/// Episode definitions - timed desired velocities, demo actions and events to replay
pub mod episode;

/// Event scheduler - fires timed side effects and supervises auxiliary actions
pub mod event_sched;

/// Chassis kinematics - conversion between chassis speeds and module states
pub mod kinematics;

/// Robot model - physical description of the chassis and its drive motors
pub mod robot_model;

/// Setpoint generator - computes dynamically feasible drive setpoints each cycle
pub mod setpoint_gen;
