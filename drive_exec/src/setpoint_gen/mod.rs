//! # Setpoint generator
//!
//! Converts a desired chassis velocity and the previous setpoint into the next setpoint the
//! drive can actually achieve within one control cycle. Each cycle the generator:
//!
//! 1. Desaturates the desired module speeds against the maximum wheel speed.
//! 2. Handles a commanded full stop by holding the module headings.
//! 3. Decides whether the whole chassis should stop and reorient its modules rather than steer
//!    every module through more than 90 degrees.
//! 4. Finds how far along the straight line from the previous to the desired velocity it can go
//!    without breaking the steering rate, drive torque or wheel friction limits.
//! 5. Discretizes the result and derives the per-module feedforwards.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod constraints;
mod params;
mod root_finding;
mod setpoint;
mod state;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

pub use constraints::*;
pub use params::*;
pub use root_finding::{MAX_DRIVE_ITERATIONS, MAX_STEER_ITERATIONS};
pub use setpoint::*;
pub use state::*;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Threshold below which speeds are treated as zero.
pub const EPSILON: f64 = 1e-8;

/// Wheel forces smaller than this produce no feedforward.
///
/// Units: newtons
pub const MIN_FEEDFORWARD_FORCE_N: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which stop a setpoint from being generated.
#[derive(Debug, thiserror::Error)]
pub enum SetpointGenError {
    #[error("The cycle period must be finite and greater than zero, found {0} s")]
    InvalidPeriod(f64),

    #[error("The previous setpoint has {found} modules but the robot has {expected}")]
    ModuleCountMismatch { expected: usize, found: usize },

    #[error("The maximum steering rate must be finite and greater than zero, found {0} rad/s")]
    InvalidSteerRate(f64),
}
