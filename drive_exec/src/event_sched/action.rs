//! Auxiliary actions started by events

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// An action which runs alongside the drive while a trajectory is followed, for example running
/// an intake.
pub trait AuxAction: Send {
    /// Called once when the action starts.
    fn initialize(&mut self) {}

    /// Called once per cycle while the action is active.
    fn step(&mut self) -> StepStatus;

    /// Called once when the action stops. `interrupted` is true if the action was cancelled rather
    /// than finishing by itself.
    fn end(&mut self, _interrupted: bool) {}

    /// Resources the action needs exclusive use of.
    fn requirements(&self) -> &[String];
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Result of stepping an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Finished,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Shared handle to a named action.
///
/// Handles compare equal only if they refer to the same action instance.
#[derive(Clone)]
pub struct ActionHandle {
    name: String,
    inner: Arc<Mutex<dyn AuxAction>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ActionHandle {
    pub fn new<A>(name: &str, action: A) -> Self
    where
        A: AuxAction + 'static,
    {
        Self {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(action)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A copy of the action's requirements.
    pub fn requirements(&self) -> Vec<String> {
        self.lock().requirements().to_vec()
    }

    /// True if this action and `other` need any of the same resources.
    pub fn conflicts_with(&self, other: &ActionHandle) -> bool {
        if self == other {
            return true;
        }

        let ours = self.requirements();
        other.lock().requirements().iter().any(|r| ours.contains(r))
    }

    pub fn initialize(&self) {
        self.lock().initialize()
    }

    pub fn step(&self) -> StepStatus {
        self.lock().step()
    }

    pub fn end(&self, interrupted: bool) {
        self.lock().end(interrupted)
    }

    // An action that panicked mid-step is still ended normally.
    fn lock(&self) -> MutexGuard<dyn AuxAction + 'static> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn id(&self) -> *const u8 {
        Arc::as_ptr(&self.inner) as *const u8
    }
}

impl PartialEq for ActionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ActionHandle {}

impl fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandle")
            .field("name", &self.name)
            .field("id", &self.id())
            .finish()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
