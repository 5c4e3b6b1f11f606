//! Implementation of the event scheduler state machine

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use std::collections::VecDeque;

use super::{
    ActionHandle, ActionRequest, BackgroundScheduler, Event, EventConditions, EventContext,
    StepStatus,
};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Runs the events of one trajectory and the actions they start.
#[derive(Debug)]
pub struct EventScheduler {
    state: SchedulerState,

    /// Events which have not fired yet, in firing order.
    pending: VecDeque<Event>,

    /// Actions started by events which have not yet finished.
    active: Vec<ActionHandle>,

    conditions: EventConditions,
    background: BackgroundScheduler,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EventScheduler {
    pub fn new(conditions: EventConditions, background: BackgroundScheduler) -> Self {
        Self {
            state: SchedulerState::Idle,
            pending: VecDeque::new(),
            active: Vec::new(),
            conditions,
            background,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn conditions(&self) -> &EventConditions {
        &self.conditions
    }

    /// Actions that are currently running.
    pub fn active_actions(&self) -> &[ActionHandle] {
        &self.active
    }

    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    /// Start an episode with the given events.
    ///
    /// Events must be sorted by timestamp. Events with equal timestamps fire in the order given.
    pub fn begin(&mut self, events: Vec<Event>) {
        if self.state == SchedulerState::Running {
            debug!(
                "Episode started while another was running, dropping {} actions and {} events",
                self.active.len(),
                self.pending.len()
            );
        }

        self.active.clear();
        self.pending = events.into();
        self.state = SchedulerState::Running;

        debug!("Event episode started with {} events", self.pending.len());
    }

    /// Fire every event due at `time_s` then step the active actions.
    pub fn tick(&mut self, time_s: f64) {
        if self.state == SchedulerState::Idle {
            trace!("Event scheduler ticked while idle");
            return;
        }

        while self
            .pending
            .front()
            .map_or(false, |e| e.timestamp_s <= time_s)
        {
            if let Some(event) = self.pending.pop_front() {
                let request = event.apply(&EventContext {
                    conditions: &self.conditions,
                    background: &self.background,
                });
                self.handle_request(request);
            }
        }

        let mut still_active = Vec::with_capacity(self.active.len());
        for action in self.active.drain(..) {
            match action.step() {
                StepStatus::Running => still_active.push(action),
                StepStatus::Finished => {
                    action.end(false);
                    debug!("Action {} finished", action.name());
                }
            }
        }
        self.active = still_active;
    }

    /// End the episode, cancelling every active action and every event which has not fired.
    pub fn end(&mut self) {
        if self.state == SchedulerState::Idle {
            return;
        }

        for action in self.active.drain(..) {
            action.end(true);
            debug!("Action {} cancelled at end of episode", action.name());
        }

        let ctx = EventContext {
            conditions: &self.conditions,
            background: &self.background,
        };
        for event in self.pending.drain(..) {
            event.cancel(&ctx);
        }

        self.state = SchedulerState::Idle;
        debug!("Event episode ended");
    }

    fn handle_request(&mut self, request: ActionRequest) {
        match request {
            ActionRequest::None => (),
            ActionRequest::Start(action) => self.start(action),
            ActionRequest::Cancel(action) => self.cancel(&action),
        }
    }

    /// Start an action, first cancelling every active action that shares a requirement with it.
    fn start(&mut self, action: ActionHandle) {
        let (conflicting, others): (Vec<_>, Vec<_>) = self
            .active
            .drain(..)
            .partition(|a| a.conflicts_with(&action));
        self.active = others;

        for c in conflicting {
            debug!("Action {} interrupted by {}", c.name(), action.name());
            c.end(true);
        }

        action.initialize();
        debug!("Action {} started", action.name());
        self.active.push(action);
    }

    fn cancel(&mut self, action: &ActionHandle) {
        match self.active.iter().position(|a| a == action) {
            Some(idx) => {
                let a = self.active.remove(idx);
                a.end(true);
                debug!("Action {} cancelled", a.name());
            }
            None => trace!("Cancel of inactive action {} ignored", action.name()),
        }
    }
}

/// Every requirement of every action started by `events`, without duplicates.
pub fn scheduler_requirements(events: &[Event]) -> Vec<String> {
    let mut reqs: Vec<String> = Vec::new();

    for r in events
        .iter()
        .filter_map(|e| e.started_action())
        .flat_map(|a| a.requirements())
    {
        if !reqs.contains(&r) {
            reqs.push(r);
        }
    }

    reqs
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::event_sched::{action::test::LogAction, EventAction};
    use std::sync::{Arc, Mutex};

    fn scheduler() -> EventScheduler {
        EventScheduler::new(EventConditions::new(), BackgroundScheduler::new())
    }

    fn set(t: f64, name: &str, value: bool) -> Event {
        Event::new(
            t,
            EventAction::SetCondition {
                name: name.into(),
                value,
            },
        )
    }

    fn log_of(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_conditions_over_time() {
        let mut sched = scheduler();
        sched.begin(vec![set(1.0, "A", true), set(2.0, "A", false)]);
        assert_eq!(sched.state(), SchedulerState::Running);

        sched.tick(0.5);
        assert!(!sched.conditions().get_condition("A"));
        sched.tick(1.5);
        assert!(sched.conditions().get_condition("A"));
        sched.tick(2.5);
        assert!(!sched.conditions().get_condition("A"));
        assert_eq!(sched.num_pending(), 0);
    }

    #[test]
    fn test_conflicting_start() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let x = LogAction::handle("x", &["drive"], None, &log);
        let y = LogAction::handle("y", &["drive"], None, &log);
        let z = LogAction::handle("z", &["intake"], None, &log);

        let mut sched = scheduler();
        sched.begin(vec![
            Event::new(0.0, EventAction::StartAction(y.clone())),
            Event::new(0.0, EventAction::StartAction(z.clone())),
            Event::new(1.0, EventAction::StartAction(x.clone())),
        ]);

        sched.tick(0.0);
        sched.tick(1.0);

        let entries = log_of(&log);
        let y_end = entries.iter().position(|e| e == "y.end(true)").unwrap();
        let x_init = entries.iter().position(|e| e == "x.initialize").unwrap();
        assert!(y_end < x_init);
        assert!(!entries.contains(&"z.end(true)".to_string()));
        assert_eq!(sched.active_actions(), &[z, x][..]);
    }

    #[test]
    fn test_restart_same_action() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = LogAction::handle("a", &[], None, &log);

        let mut sched = scheduler();
        sched.begin(vec![
            Event::new(0.0, EventAction::StartAction(a.clone())),
            Event::new(1.0, EventAction::StartAction(a.clone())),
        ]);
        sched.tick(0.0);
        sched.tick(1.0);

        assert_eq!(
            log_of(&log),
            vec![
                "a.initialize",
                "a.step",
                "a.end(true)",
                "a.initialize",
                "a.step"
            ]
        );
        assert_eq!(sched.active_actions().len(), 1);
    }

    #[test]
    fn test_end_cancels_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = LogAction::handle("a", &["drive"], None, &log);

        let mut sched = scheduler();
        sched.begin(vec![Event::new(0.0, EventAction::StartAction(a))]);
        sched.tick(0.0);

        sched.end();
        sched.end();

        let ends = log_of(&log)
            .iter()
            .filter(|e| e.starts_with("a.end"))
            .count();
        assert_eq!(ends, 1);
        assert!(log_of(&log).contains(&"a.end(true)".to_string()));
        assert!(sched.active_actions().is_empty());
        assert_eq!(sched.state(), SchedulerState::Idle);

        // Ticking while idle does nothing
        sched.tick(5.0);
        assert_eq!(log_of(&log).len(), 3);
    }

    #[test]
    fn test_end_cancels_pending() {
        let mut sched = scheduler();
        sched.begin(vec![
            set(1.0, "A", true),
            set(2.0, "A", false),
            set(3.0, "B", true),
            Event::new(
                4.0,
                EventAction::ZoneCondition {
                    name: "Z".into(),
                    active: false,
                },
            ),
        ]);
        sched.conditions().set_zone("Z", true);

        sched.tick(1.0);
        assert!(sched.conditions().get_condition("A"));

        sched.end();
        assert_eq!(sched.num_pending(), 0);
        assert!(!sched.conditions().get_condition("A"));
        assert!(!sched.conditions().get_condition("B"));
        assert!(!sched.conditions().get_zone("Z"));
    }

    #[test]
    fn test_finish_and_cancel() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = LogAction::handle("a", &[], Some(2), &log);
        let b = LogAction::handle("b", &[], None, &log);

        let mut sched = scheduler();
        sched.begin(vec![
            Event::new(0.0, EventAction::StartAction(a.clone())),
            Event::new(0.5, EventAction::CancelAction(b.clone())),
            Event::new(1.0, EventAction::StartAction(b.clone())),
            Event::new(2.0, EventAction::CancelAction(b.clone())),
        ]);

        sched.tick(0.0);
        sched.tick(0.5);
        assert!(sched.active_actions().is_empty());

        sched.tick(1.0);
        assert_eq!(sched.active_actions(), &[b.clone()][..]);
        sched.tick(2.0);
        assert!(sched.active_actions().is_empty());

        assert_eq!(
            log_of(&log),
            vec![
                "a.initialize",
                "a.step",
                "a.step",
                "a.end(false)",
                "b.initialize",
                "b.step",
                "b.end(true)"
            ]
        );
    }

    #[test]
    fn test_requirements() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let events = vec![
            Event::new(
                0.0,
                EventAction::StartAction(LogAction::handle("a", &["intake", "arm"], None, &log)),
            ),
            set(0.5, "A", true),
            Event::new(
                1.0,
                EventAction::StartAction(LogAction::handle("b", &["arm", "shooter"], None, &log)),
            ),
        ];

        assert_eq!(
            scheduler_requirements(&events),
            vec!["intake", "arm", "shooter"]
        );
        assert!(scheduler_requirements(&[]).is_empty());
    }
}
