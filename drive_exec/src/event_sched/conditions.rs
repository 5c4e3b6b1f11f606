//! Shared store of named conditions

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to a store of named boolean conditions.
///
/// Clones share the same store. Conditions which have never been set read as `false`.
#[derive(Clone, Debug, Default)]
pub struct EventConditions {
    inner: Arc<RwLock<ConditionMaps>>,
}

#[derive(Debug, Default)]
struct ConditionMaps {
    /// Conditions set by trigger events.
    triggers: HashMap<String, bool>,

    /// Conditions set while the robot is inside a point-towards zone.
    zones: HashMap<String, bool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EventConditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of an event trigger.
    pub fn get_condition(&self, name: &str) -> bool {
        self.read().triggers.get(name).copied().unwrap_or(false)
    }

    pub fn set_condition(&self, name: &str, value: bool) {
        self.write().triggers.insert(name.to_string(), value);
    }

    /// Get whether the robot is inside the named point-towards zone.
    pub fn get_zone(&self, name: &str) -> bool {
        self.read().zones.get(name).copied().unwrap_or(false)
    }

    pub fn set_zone(&self, name: &str, active: bool) {
        self.write().zones.insert(name.to_string(), active);
    }

    /// Names of every trigger that is currently true, sorted.
    pub fn active_conditions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .triggers
            .iter()
            .filter(|(_, v)| **v)
            .map(|(k, _)| k.clone())
            .collect();
        names.sort();
        names
    }

    /// Reset every trigger and zone to false.
    pub fn clear(&self) {
        let mut maps = self.write();
        maps.triggers.clear();
        maps.zones.clear();
    }

    // Writers only ever insert whole values so a poisoned store is still consistent.
    fn read(&self) -> RwLockReadGuard<ConditionMaps> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<ConditionMaps> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
