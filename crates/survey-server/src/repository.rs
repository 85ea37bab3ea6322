//! Mission descriptors in, terminal outcomes out.

use std::path::Path;

use anyhow::Context;
use dashmap::DashMap;
use survey_core::{MissionDescriptor, MissionOutcome};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("mission {0} not found")]
    NotFound(String),
    #[error("invalid mission: {0}")]
    Invalid(String),
}

/// Source of mission descriptors and sink for terminal outcomes.
pub trait MissionRepository: Send + Sync {
    fn find_mission(&self, mission_id: &str) -> Result<MissionDescriptor, RepositoryError>;
    fn record_outcome(&self, outcome: MissionOutcome) -> Result<(), RepositoryError>;
}

/// Process-local repository. Stands in for the mission store owned by
/// the surrounding application.
#[derive(Default)]
pub struct InMemoryMissionRepository {
    missions: DashMap<String, MissionDescriptor>,
    outcomes: DashMap<String, MissionOutcome>,
}

impl InMemoryMissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a descriptor after validating it.
    pub fn upsert_mission(&self, descriptor: MissionDescriptor) -> Result<(), RepositoryError> {
        if descriptor.mission_id.trim().is_empty() {
            return Err(RepositoryError::Invalid("mission_id is required".to_string()));
        }
        let errors = descriptor.validate();
        if !errors.is_empty() {
            return Err(RepositoryError::Invalid(errors.join("; ")));
        }
        self.missions.insert(descriptor.mission_id.clone(), descriptor);
        Ok(())
    }

    pub fn list_missions(&self) -> Vec<MissionDescriptor> {
        let mut missions: Vec<MissionDescriptor> =
            self.missions.iter().map(|entry| entry.value().clone()).collect();
        missions.sort_by(|a, b| a.mission_id.cmp(&b.mission_id));
        missions
    }

    pub fn outcome(&self, mission_id: &str) -> Option<MissionOutcome> {
        self.outcomes.get(mission_id).map(|entry| entry.value().clone())
    }

    /// Load a JSON array of descriptors. Invalid entries are skipped with a
    /// warning; returns how many were loaded.
    pub fn load_file(&self, path: impl AsRef<Path>) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading missions file {}", path.display()))?;
        let descriptors: Vec<MissionDescriptor> = serde_json::from_str(&text)
            .with_context(|| format!("parsing missions file {}", path.display()))?;

        let mut loaded = 0;
        for descriptor in descriptors {
            let mission_id = descriptor.mission_id.clone();
            match self.upsert_mission(descriptor) {
                Ok(()) => loaded += 1,
                Err(err) => tracing::warn!("Skipping mission {}: {}", mission_id, err),
            }
        }
        Ok(loaded)
    }
}

impl MissionRepository for InMemoryMissionRepository {
    fn find_mission(&self, mission_id: &str) -> Result<MissionDescriptor, RepositoryError> {
        self.missions
            .get(mission_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RepositoryError::NotFound(mission_id.to_string()))
    }

    fn record_outcome(&self, outcome: MissionOutcome) -> Result<(), RepositoryError> {
        tracing::info!(
            "Recorded outcome for mission {}: {:?} ({}/{} waypoints)",
            outcome.mission_id,
            outcome.status,
            outcome.waypoints_visited,
            outcome.total_waypoints
        );
        self.outcomes.insert(outcome.mission_id.clone(), outcome);
        Ok(())
    }
}
