//! # Event scheduler
//!
//! Fires timestamped side effects while a trajectory is being followed, and supervises the
//! auxiliary actions those events start. An episode runs from [`EventScheduler::begin`] to
//! [`EventScheduler::end`], with [`EventScheduler::tick`] called once per control cycle with the
//! time since the start of the trajectory.
//!
//! Named conditions are published through a shared [`EventConditions`] store so that other parts
//! of the robot program can poll them. Pulsed conditions are reset by the
//! [`BackgroundScheduler`], which keeps running between episodes.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod action;
mod background;
mod conditions;
mod event;
mod state;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

pub use action::*;
pub use background::*;
pub use conditions::*;
pub use event::*;
pub use state::*;
