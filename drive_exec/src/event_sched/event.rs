//! Timestamped trajectory events

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;

use super::{ActionHandle, AuxAction, BackgroundScheduler, EventConditions, StepStatus};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An action to take at a given time along a trajectory.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Time since the start of the trajectory at which the event fires.
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    pub action: EventAction,
}

/// Everything needed to apply or cancel an event.
pub struct EventContext<'a> {
    pub conditions: &'a EventConditions,
    pub background: &'a BackgroundScheduler,
}

/// One-shot background action which resets a pulsed condition.
struct ConditionReset {
    name: String,
    conditions: EventConditions,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum EventAction {
    /// Set a named condition.
    SetCondition { name: String, value: bool },

    /// Set a named condition for a single cycle.
    PulseCondition { name: String },

    /// Mark the robot as entering or leaving a point-towards zone.
    ZoneCondition { name: String, active: bool },

    /// Start an auxiliary action, cancelling any conflicting ones.
    StartAction(ActionHandle),

    /// Cancel an auxiliary action if it is running.
    CancelAction(ActionHandle),
}

/// Side effects on the scheduler's set of active actions that an event asks for.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionRequest {
    None,
    Start(ActionHandle),
    Cancel(ActionHandle),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Event {
    pub fn new(timestamp_s: f64, action: EventAction) -> Self {
        Self {
            timestamp_s,
            action,
        }
    }

    /// Copy of this event at a different time.
    pub fn with_timestamp(&self, timestamp_s: f64) -> Self {
        Self {
            timestamp_s,
            action: self.action.clone(),
        }
    }

    /// Apply the event's condition changes.
    ///
    /// Starting and cancelling actions is left to the scheduler, which owns the active set, so
    /// those are returned as a request.
    pub fn apply(&self, ctx: &EventContext) -> ActionRequest {
        trace!("Applying event at {:.3} s: {:?}", self.timestamp_s, self.action);

        match &self.action {
            EventAction::SetCondition { name, value } => {
                ctx.conditions.set_condition(name, *value);
                ActionRequest::None
            }
            EventAction::PulseCondition { name } => {
                ctx.conditions.set_condition(name, true);
                ctx.background.schedule(ActionHandle::new(
                    &format!("reset_{}", name),
                    ConditionReset {
                        name: name.clone(),
                        conditions: ctx.conditions.clone(),
                    },
                ));
                ActionRequest::None
            }
            EventAction::ZoneCondition { name, active } => {
                ctx.conditions.set_zone(name, *active);
                ActionRequest::None
            }
            EventAction::StartAction(handle) => ActionRequest::Start(handle.clone()),
            EventAction::CancelAction(handle) => ActionRequest::Cancel(handle.clone()),
        }
    }

    /// Cancel an event which never fired.
    ///
    /// Only conditions that the event would have turned off are touched, so a condition left on
    /// by an earlier event is cleared when the episode ends early.
    pub fn cancel(&self, ctx: &EventContext) {
        match &self.action {
            EventAction::SetCondition { name, value } if !value => {
                ctx.conditions.set_condition(name, false)
            }
            EventAction::ZoneCondition { name, active } if !active => {
                ctx.conditions.set_zone(name, false)
            }
            _ => (),
        }
    }

    /// The action started by this event, if any.
    pub fn started_action(&self) -> Option<&ActionHandle> {
        match &self.action {
            EventAction::StartAction(handle) => Some(handle),
            _ => None,
        }
    }
}

impl AuxAction for ConditionReset {
    fn step(&mut self) -> StepStatus {
        self.conditions.set_condition(&self.name, false);
        StepStatus::Finished
    }

    fn requirements(&self) -> &[String] {
        &[]
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
