//! Always-on scheduler for actions which outlive an episode

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ActionHandle, StepStatus};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the background scheduler. Clones share the same queues.
#[derive(Clone, Debug, Default)]
pub struct BackgroundScheduler {
    inner: Arc<Mutex<Queues>>,
}

#[derive(Debug, Default)]
struct Queues {
    /// Actions waiting to be initialized on the next run.
    scheduled: Vec<ActionHandle>,

    /// Actions which are stepped on each run.
    active: Vec<ActionHandle>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BackgroundScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action to be started on the next call to [`BackgroundScheduler::run`].
    pub fn schedule(&self, action: ActionHandle) {
        trace!("Background action {} scheduled", action.name());
        self.lock().scheduled.push(action);
    }

    /// Step every active action, then start the actions scheduled since the last run.
    ///
    /// Actions are run without the queues locked, so they may schedule further actions.
    pub fn run(&self) {
        let active = std::mem::take(&mut self.lock().active);
        let mut still_active = Vec::with_capacity(active.len());

        for action in active {
            match action.step() {
                StepStatus::Running => still_active.push(action),
                StepStatus::Finished => {
                    action.end(false);
                    trace!("Background action {} finished", action.name());
                }
            }
        }

        let scheduled = std::mem::take(&mut self.lock().scheduled);
        for action in scheduled.iter() {
            action.initialize();
        }
        still_active.extend(scheduled);

        let mut queues = self.lock();
        still_active.append(&mut queues.active);
        queues.active = still_active;
    }

    /// Number of actions that are active or waiting to start.
    pub fn len(&self) -> usize {
        let queues = self.lock();
        queues.scheduled.len() + queues.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<Queues> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
