//! Publishing entity states to the host platform.

pub mod home_assistant;
pub mod memory;

use std::sync::Arc;

use crate::config::{PublishBackend, PublishConfig};
use crate::error::{MailError, Result};
use crate::model::sensor::SensorState;

pub use home_assistant::HomeAssistantPublisher;
pub use memory::MemoryPublisher;

/// Something that accepts entity states: the host's state bus.
pub trait StatePublisher: Send + Sync {
    /// Set (create or overwrite) the state of one entity.
    fn set_state(&self, state: &SensorState) -> Result<()>;
}

impl<P: StatePublisher + ?Sized> StatePublisher for Arc<P> {
    fn set_state(&self, state: &SensorState) -> Result<()> {
        (**self).set_state(state)
    }
}

/// Build the publisher selected by the configuration.
pub fn from_config(config: &PublishConfig) -> Result<Arc<dyn StatePublisher>> {
    match config.backend {
        PublishBackend::Log => Ok(Arc::new(MemoryPublisher::new())),
        PublishBackend::HomeAssistant => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                MailError::Config("publish.base_url is required".into())
            })?;
            let token = config
                .token
                .as_deref()
                .ok_or_else(|| MailError::Config("publish.token is required".into()))?;
            Ok(Arc::new(HomeAssistantPublisher::new(
                base_url,
                token,
                std::time::Duration::from_secs(config.timeout_secs.max(1)),
            )))
        }
    }
}
