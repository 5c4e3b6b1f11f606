//! # Episode definitions
//!
//! An episode is a scripted run of the drive: a set of desired velocity keyframes which are
//! interpolated over time, a set of named demo actions, and the timed events which start, cancel
//! and signal during the run. Episodes are loaded from TOML files such as:
//!
//! ```toml
//! duration_s = 4.0
//!
//! [[keyframes]]
//! time_s = 0.0
//! vx_ms = 0.0
//!
//! [[keyframes]]
//! time_s = 1.0
//! vx_ms = 2.0
//!
//! [[actions]]
//! name = "intake"
//! requirements = ["intake"]
//! duration_s = 0.5
//!
//! [[events]]
//! kind = "start_action"
//! time_s = 0.5
//! action = "intake"
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use serde::Deserialize;
use std::{cmp::Ordering, collections::HashMap, path::Path};
use thiserror::Error;
use util::{
    maths::{lerp, lin_map},
    params::{self, LoadError},
};

use crate::{
    event_sched::{ActionHandle, AuxAction, Event, EventAction, StepStatus},
    kinematics::ChassisSpeeds,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A scripted drive episode.
#[derive(Clone, Debug, Deserialize)]
pub struct Episode {
    /// Length of the episode.
    ///
    /// Units: seconds
    pub duration_s: f64,

    /// Desired velocity keyframes, in increasing time order.
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,

    #[serde(default)]
    pub actions: Vec<ActionDef>,

    #[serde(default)]
    pub events: Vec<EventDef>,
}

/// Desired chassis velocity at a point in time.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Keyframe {
    /// Units: seconds
    pub time_s: f64,

    /// Units: meters/second
    #[serde(default)]
    pub vx_ms: f64,

    /// Units: meters/second
    #[serde(default)]
    pub vy_ms: f64,

    /// Units: radians/second
    #[serde(default)]
    pub omega_rads: f64,
}

/// Definition of a demo action.
#[derive(Clone, Debug, Deserialize)]
pub struct ActionDef {
    pub name: String,

    #[serde(default)]
    pub requirements: Vec<String>,

    /// How long the action runs for once started, or `None` to run until cancelled.
    ///
    /// Units: seconds
    #[serde(default)]
    pub duration_s: Option<f64>,
}

/// Demo action which logs its lifecycle and finishes after a fixed number of cycles.
pub struct TimedAction {
    name: String,
    requirements: Vec<String>,
    num_cycles: Option<usize>,
    cycles_left: Option<usize>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Definition of a timed event, tagged by `kind`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDef {
    SetCondition {
        time_s: f64,
        name: String,
        value: bool,
    },
    PulseCondition {
        time_s: f64,
        name: String,
    },
    ZoneCondition {
        time_s: f64,
        name: String,
        active: bool,
    },
    StartAction {
        time_s: f64,
        action: String,
    },
    CancelAction {
        time_s: f64,
        action: String,
    },
}

#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error("Could not load the episode: {0}")]
    LoadError(LoadError),

    #[error("The episode duration must be finite and greater than zero, found {0} s")]
    InvalidDuration(f64),

    #[error("Keyframe {0} is not later than the keyframe before it")]
    UnsortedKeyframes(usize),

    #[error("Action \"{0}\" is defined more than once")]
    DuplicateAction(String),

    #[error("An event refers to the undefined action \"{0}\"")]
    UnknownAction(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Episode {
    /// Load and validate an episode file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EpisodeError> {
        let episode: Self = params::load_path(path).map_err(EpisodeError::LoadError)?;
        episode.validate()?;

        Ok(episode)
    }

    /// Parse and validate an episode from a TOML string.
    pub fn from_str(episode_str: &str) -> Result<Self, EpisodeError> {
        let episode: Self = params::from_str(episode_str).map_err(EpisodeError::LoadError)?;
        episode.validate()?;

        Ok(episode)
    }

    pub fn validate(&self) -> Result<(), EpisodeError> {
        if !(self.duration_s.is_finite() && self.duration_s > 0.0) {
            return Err(EpisodeError::InvalidDuration(self.duration_s));
        }

        for (i, pair) in self.keyframes.windows(2).enumerate() {
            if pair[1].time_s <= pair[0].time_s {
                return Err(EpisodeError::UnsortedKeyframes(i + 1));
            }
        }

        for (i, def) in self.actions.iter().enumerate() {
            if self.actions[..i].iter().any(|d| d.name == def.name) {
                return Err(EpisodeError::DuplicateAction(def.name.clone()));
            }
        }

        Ok(())
    }

    /// Desired chassis speeds at `time_s`.
    ///
    /// Speeds are linearly interpolated between keyframes and held constant before the first and
    /// after the last. With no keyframes the desired speeds are zero.
    pub fn desired_at(&self, time_s: f64) -> ChassisSpeeds {
        let next = self.keyframes.iter().position(|k| k.time_s > time_s);

        match next {
            None => self.keyframes.last().map(Keyframe::speeds).unwrap_or_default(),
            Some(0) => self.keyframes[0].speeds(),
            Some(i) => {
                let k0 = &self.keyframes[i - 1];
                let k1 = &self.keyframes[i];
                let t = lin_map((k0.time_s, k1.time_s), (0.0, 1.0), time_s);

                ChassisSpeeds::new(
                    lerp(k0.vx_ms, k1.vx_ms, t),
                    lerp(k0.vy_ms, k1.vy_ms, t),
                    lerp(k0.omega_rads, k1.omega_rads, t),
                )
            }
        }
    }

    /// Create the demo actions, keyed by name.
    pub fn build_actions(&self, cycle_period_s: f64) -> HashMap<String, ActionHandle> {
        self.actions
            .iter()
            .map(|def| {
                let action = TimedAction::new(def, cycle_period_s);
                (def.name.clone(), ActionHandle::new(&def.name, action))
            })
            .collect()
    }

    /// Create the scheduler events, sorted by time.
    ///
    /// Events with equal times keep the order they were defined in.
    pub fn build_events(
        &self,
        actions: &HashMap<String, ActionHandle>,
    ) -> Result<Vec<Event>, EpisodeError> {
        let lookup = |name: &str| {
            actions
                .get(name)
                .cloned()
                .ok_or_else(|| EpisodeError::UnknownAction(name.to_string()))
        };

        let mut events = Vec::with_capacity(self.events.len());

        for def in self.events.iter() {
            let event = match def {
                EventDef::SetCondition {
                    time_s,
                    name,
                    value,
                } => Event::new(
                    *time_s,
                    EventAction::SetCondition {
                        name: name.clone(),
                        value: *value,
                    },
                ),
                EventDef::PulseCondition { time_s, name } => Event::new(
                    *time_s,
                    EventAction::PulseCondition { name: name.clone() },
                ),
                EventDef::ZoneCondition {
                    time_s,
                    name,
                    active,
                } => Event::new(
                    *time_s,
                    EventAction::ZoneCondition {
                        name: name.clone(),
                        active: *active,
                    },
                ),
                EventDef::StartAction { time_s, action } => {
                    Event::new(*time_s, EventAction::StartAction(lookup(action)?))
                }
                EventDef::CancelAction { time_s, action } => {
                    Event::new(*time_s, EventAction::CancelAction(lookup(action)?))
                }
            };

            events.push(event);
        }

        events.sort_by(|a, b| {
            a.timestamp_s
                .partial_cmp(&b.timestamp_s)
                .unwrap_or(Ordering::Equal)
        });

        Ok(events)
    }
}

impl Keyframe {
    pub fn speeds(&self) -> ChassisSpeeds {
        ChassisSpeeds::new(self.vx_ms, self.vy_ms, self.omega_rads)
    }
}

impl TimedAction {
    pub fn new(def: &ActionDef, cycle_period_s: f64) -> Self {
        let num_cycles = def
            .duration_s
            .map(|d| ((d / cycle_period_s).ceil() as usize).max(1));

        Self {
            name: def.name.clone(),
            requirements: def.requirements.clone(),
            num_cycles,
            cycles_left: num_cycles,
        }
    }
}

impl AuxAction for TimedAction {
    fn initialize(&mut self) {
        self.cycles_left = self.num_cycles;
        info!("Action {} started", self.name);
    }

    fn step(&mut self) -> StepStatus {
        match self.cycles_left.as_mut() {
            Some(n) if *n <= 1 => StepStatus::Finished,
            Some(n) => {
                *n -= 1;
                StepStatus::Running
            }
            None => StepStatus::Running,
        }
    }

    fn end(&mut self, interrupted: bool) {
        if interrupted {
            info!("Action {} interrupted", self.name);
        } else {
            info!("Action {} complete", self.name);
        }
    }

    fn requirements(&self) -> &[String] {
        &self.requirements
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const EPISODE: &str = r#"
        duration_s = 3.0

        [[keyframes]]
        time_s = 0.0

        [[keyframes]]
        time_s = 1.0
        vx_ms = 2.0
        omega_rads = 1.0

        [[actions]]
        name = "intake"
        requirements = ["intake"]
        duration_s = 0.1

        [[actions]]
        name = "aim"

        [[events]]
        kind = "start_action"
        time_s = 1.0
        action = "intake"

        [[events]]
        kind = "set_condition"
        time_s = 0.5
        name = "deploy"
        value = true

        [[events]]
        kind = "pulse_condition"
        time_s = 1.0
        name = "flash"

        [[events]]
        kind = "cancel_action"
        time_s = 2.0
        action = "aim"
    "#;

    #[test]
    fn test_desired_at() {
        let ep = Episode::from_str(EPISODE).unwrap();

        assert_eq!(ep.desired_at(-1.0), ChassisSpeeds::default());
        assert_eq!(ep.desired_at(0.5), ChassisSpeeds::new(1.0, 0.0, 0.5));
        assert_eq!(ep.desired_at(2.5), ChassisSpeeds::new(2.0, 0.0, 1.0));
    }

    #[test]
    fn test_build_events() {
        let ep = Episode::from_str(EPISODE).unwrap();
        let actions = ep.build_actions(0.02);
        assert_eq!(actions.len(), 2);

        let events = ep.build_events(&actions).unwrap();
        let times: Vec<f64> = events.iter().map(|e| e.timestamp_s).collect();
        assert_eq!(times, vec![0.5, 1.0, 1.0, 2.0]);

        // Equal times keep their file order
        assert_eq!(events[1].started_action(), actions.get("intake"));
        assert_eq!(
            events[2].action,
            EventAction::PulseCondition {
                name: "flash".into()
            }
        );

        let mut missing = actions.clone();
        missing.remove("aim");
        assert!(matches!(
            ep.build_events(&missing),
            Err(EpisodeError::UnknownAction(n)) if n == "aim"
        ));
    }

    #[test]
    fn test_invalid_episodes() {
        assert!(matches!(
            Episode::from_str("duration_s = 0.0"),
            Err(EpisodeError::InvalidDuration(_))
        ));
        assert!(matches!(
            Episode::from_str(
                r#"
                duration_s = 1.0
                [[keyframes]]
                time_s = 1.0
                [[keyframes]]
                time_s = 0.5
                "#
            ),
            Err(EpisodeError::UnsortedKeyframes(1))
        ));
        assert!(matches!(
            Episode::from_str(
                r#"
                duration_s = 1.0
                [[actions]]
                name = "a"
                [[actions]]
                name = "a"
                "#
            ),
            Err(EpisodeError::DuplicateAction(_))
        ));
        assert!(matches!(
            Episode::from_str("duration_s = 1.0\n[[events]]\nkind = \"explode\"\ntime_s = 0.0\n"),
            Err(EpisodeError::LoadError(_))
        ));
    }

    #[test]
    fn test_demo_episode() {
        let ep = Episode::load(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../params/episodes/demo.toml"
        ))
        .unwrap();
        let actions = ep.build_actions(0.02);
        let events = ep.build_events(&actions).unwrap();

        assert_eq!(events.len(), ep.events.len());
        assert!(events
            .windows(2)
            .all(|w| w[0].timestamp_s <= w[1].timestamp_s));
    }

    #[test]
    fn test_timed_action() {
        let def = ActionDef {
            name: "spin".into(),
            requirements: vec![],
            duration_s: Some(0.05),
        };
        let mut action = TimedAction::new(&def, 0.02);

        action.initialize();
        assert_eq!(action.step(), StepStatus::Running);
        assert_eq!(action.step(), StepStatus::Running);
        assert_eq!(action.step(), StepStatus::Finished);

        // Restarting resets the count
        action.initialize();
        assert_eq!(action.step(), StepStatus::Running);
    }
}
