//! Shared application state.

use std::sync::Arc;

use crate::config::Config;
use crate::publisher::BroadcastPublisher;
use crate::repository::InMemoryMissionRepository;
use crate::sim::SimulationRegistry;

/// Application state handed to every handler.
pub struct AppState {
    config: Config,
    repository: Arc<InMemoryMissionRepository>,
    publisher: Arc<BroadcastPublisher>,
    registry: SimulationRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let repository = Arc::new(InMemoryMissionRepository::new());
        let publisher = Arc::new(BroadcastPublisher::new(config.event_capacity));
        let registry = SimulationRegistry::new(
            repository.clone(),
            publisher.clone(),
            config.rules.clone(),
            config.tick_period,
        );
        Self {
            config,
            repository,
            publisher,
            registry,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &InMemoryMissionRepository {
        &self.repository
    }

    pub fn publisher(&self) -> &BroadcastPublisher {
        &self.publisher
    }

    pub fn registry(&self) -> &SimulationRegistry {
        &self.registry
    }
}
