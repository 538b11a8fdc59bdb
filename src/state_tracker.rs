use std::collections::HashMap;
use tracing::debug;

use crate::models::{Availability, ItemKey, StockMap};

/// A reportable difference between the last known and the current stock of
/// one item. A label that was available and is missing from the current
/// stock counts as newly unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: ItemKey,
    pub newly_available: Vec<String>,
    pub newly_unavailable: Vec<String>,
    pub current: StockMap,
    pub first_observation: bool,
}

/// Last known stock per item for the lifetime of the process.
#[derive(Debug, Default)]
pub struct StateTracker {
    last: HashMap<ItemKey, StockMap>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `availability` for `key`, returning an event when it should be
    /// reported. `Unknown` leaves the stored state untouched. A first
    /// observation is reported only when something is available.
    pub fn evaluate(&mut self, key: &ItemKey, availability: &Availability) -> Option<ChangeEvent> {
        let Availability::Known(current) = availability else {
            debug!("{}: availability unknown, keeping previous state", key);
            return None;
        };

        let previous = self.last.get(key);
        if previous == Some(current) {
            return None;
        }

        let mut newly_available = Vec::new();
        let mut newly_unavailable = Vec::new();
        for (label, available) in current.iter() {
            if previous.and_then(|p| p.get(label)) == Some(available) {
                continue;
            }
            if available {
                newly_available.push(label.to_string());
            } else {
                newly_unavailable.push(label.to_string());
            }
        }
        if let Some(previous) = previous {
            for (label, was_available) in previous.iter() {
                if was_available && current.get(label).is_none() {
                    newly_unavailable.push(label.to_string());
                }
            }
        }

        let first_observation = previous.is_none();
        self.last.insert(key.clone(), current.clone());

        if first_observation && !current.any_available() {
            debug!("{}: first observation, nothing available, recorded silently", key);
            return None;
        }

        Some(ChangeEvent {
            key: key.clone(),
            newly_available,
            newly_unavailable,
            current: current.clone(),
            first_observation,
        })
    }

    pub fn get(&self, key: &ItemKey) -> Option<&StockMap> {
        self.last.get(key)
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
