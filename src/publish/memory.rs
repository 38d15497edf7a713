//! In-process state store: records every published state and logs it.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::error::Result;
use crate::model::sensor::SensorState;
use crate::publish::StatePublisher;

/// Records every published state; [`MemoryPublisher::get`] returns the latest one.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    history: Mutex<Vec<SensorState>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest state of `entity_id`, if it was ever published.
    pub fn get(&self, entity_id: &str) -> Option<SensorState> {
        self.lock()
            .iter()
            .rev()
            .find(|s| s.entity_id == entity_id)
            .cloned()
    }

    /// Number of `set_state` calls so far.
    pub fn publish_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SensorState>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatePublisher for MemoryPublisher {
    fn set_state(&self, state: &SensorState) -> Result<()> {
        info!(
            entity_id = %state.entity_id,
            state = %state.state,
            attributes = ?state.attributes,
            "State updated"
        );
        self.lock().push(state.clone());
        Ok(())
    }
}
