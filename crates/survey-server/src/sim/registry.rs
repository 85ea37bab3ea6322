//! Registry of running missions.
//!
//! Holds at most one [`MissionHandle`] per mission id. Each handle fronts
//! a tokio task that owns the [`MissionSim`] and is reached only through
//! its command channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use survey_core::{
    generate, FlightPath, FlightPattern, MissionSim, PathParams, SimError, SimResult, SimRules,
    SimSnapshot, SurveyArea,
};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::publisher::TelemetryPublisher;
use crate::repository::{MissionRepository, RepositoryError};
use crate::sim::task::{run_mission, SimCommand, TaskContext};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct MissionHandle {
    pub run_id: String,
    pub drone_id: String,
    pub started_at: DateTime<Utc>,
    pub total_waypoints: usize,
    commands: mpsc::Sender<SimCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started {
        run_id: String,
        total_waypoints: usize,
    },
    AlreadyRunning {
        run_id: String,
    },
}

/// Summary of a running mission for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveMission {
    pub mission_id: String,
    pub drone_id: String,
    pub run_id: String,
    pub total_waypoints: usize,
    pub started_at: DateTime<Utc>,
}

pub struct SimulationRegistry {
    handles: Arc<DashMap<String, MissionHandle>>,
    repository: Arc<dyn MissionRepository>,
    publisher: Arc<dyn TelemetryPublisher>,
    rules: SimRules,
    tick_period: Duration,
}

impl SimulationRegistry {
    pub fn new(
        repository: Arc<dyn MissionRepository>,
        publisher: Arc<dyn TelemetryPublisher>,
        rules: SimRules,
        tick_period: Duration,
    ) -> Self {
        Self {
            handles: Arc::new(DashMap::new()),
            repository,
            publisher,
            rules,
            tick_period,
        }
    }

    pub fn rules(&self) -> &SimRules {
        &self.rules
    }

    /// Start simulating `mission_id`. Starting a mission that is already
    /// running leaves the existing run untouched.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        mission_id: &str,
        pattern: Option<FlightPattern>,
    ) -> SimResult<StartOutcome> {
        if let Some(handle) = self.handles.get(mission_id) {
            return Ok(StartOutcome::AlreadyRunning {
                run_id: handle.run_id.clone(),
            });
        }

        let descriptor = self.repository.find_mission(mission_id).map_err(|err| match err {
            RepositoryError::NotFound(id) => {
                SimError::Configuration(format!("mission {id} not found"))
            }
            RepositoryError::Invalid(reason) => SimError::Configuration(reason),
        })?;
        let mut sim = MissionSim::from_descriptor(&descriptor, pattern, self.rules.clone())?;

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let run_id = Uuid::new_v4().to_string();
        let total_waypoints = sim.path().len();

        match self.handles.entry(mission_id.to_string()) {
            Entry::Occupied(existing) => {
                return Ok(StartOutcome::AlreadyRunning {
                    run_id: existing.get().run_id.clone(),
                });
            }
            Entry::Vacant(slot) => {
                let events = sim.start()?;
                slot.insert(MissionHandle {
                    run_id: run_id.clone(),
                    drone_id: descriptor.drone_id.clone(),
                    started_at: Utc::now(),
                    total_waypoints,
                    commands: tx,
                });
                for event in events {
                    self.publisher.publish(event);
                }
            }
        }

        let ctx = TaskContext {
            run_id: run_id.clone(),
            tick_period: self.tick_period,
            handles: self.handles.clone(),
            publisher: self.publisher.clone(),
            repository: self.repository.clone(),
        };
        tokio::spawn(run_mission(sim, rx, ctx));

        tracing::info!(
            "Started mission {} (drone {}, {} waypoints, run {})",
            mission_id,
            descriptor.drone_id,
            total_waypoints,
            run_id
        );
        Ok(StartOutcome::Started {
            run_id,
            total_waypoints,
        })
    }

    pub async fn pause(&self, mission_id: &str) -> SimResult<()> {
        self.request(mission_id, SimCommand::Pause).await?
    }

    pub async fn resume(&self, mission_id: &str) -> SimResult<()> {
        self.request(mission_id, SimCommand::Resume).await?
    }

    /// Abort the mission and tear down its task.
    pub async fn stop(&self, mission_id: &str) -> SimResult<()> {
        self.request(mission_id, |ack| SimCommand::Stop {
            reason: "stopped by operator".to_string(),
            ack,
        })
        .await?
    }

    /// Returns the clamped speed actually applied.
    pub async fn set_speed(&self, mission_id: &str, speed_mps: f64) -> SimResult<f64> {
        self.request(mission_id, |ack| SimCommand::SetSpeed { speed_mps, ack })
            .await?
    }

    pub async fn trigger_rth(&self, mission_id: &str) -> SimResult<()> {
        self.request(mission_id, SimCommand::TriggerRth).await?
    }

    pub async fn snapshot(&self, mission_id: &str) -> SimResult<SimSnapshot> {
        self.request(mission_id, SimCommand::Snapshot).await
    }

    pub fn is_running(&self, mission_id: &str) -> bool {
        self.handles.contains_key(mission_id)
    }

    pub fn active(&self) -> Vec<ActiveMission> {
        let mut active: Vec<ActiveMission> = self
            .handles
            .iter()
            .map(|entry| ActiveMission {
                mission_id: entry.key().clone(),
                drone_id: entry.drone_id.clone(),
                run_id: entry.run_id.clone(),
                total_waypoints: entry.total_waypoints,
                started_at: entry.started_at,
            })
            .collect();
        active.sort_by(|a, b| a.mission_id.cmp(&b.mission_id));
        active
    }

    /// Abort every running mission. Returns how many were stopped.
    pub async fn shutdown(&self) -> usize {
        let running: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        let mut stopped = 0;
        for mission_id in running {
            let result = self
                .request(&mission_id, |ack| SimCommand::Stop {
                    reason: "server shutdown".to_string(),
                    ack,
                })
                .await;
            if matches!(result, Ok(Ok(()))) {
                stopped += 1;
            }
        }
        tracing::info!("Stopped {} mission(s) on shutdown", stopped);
        stopped
    }

    /// Generate a path without starting anything.
    pub fn preview(
        &self,
        area: &SurveyArea,
        pattern: FlightPattern,
        params: &PathParams,
    ) -> SimResult<FlightPath> {
        let errors = area.validate();
        if !errors.is_empty() {
            return Err(SimError::Configuration(errors.join("; ")));
        }
        let path = generate(area, pattern, params);
        if path.is_empty() {
            return Err(SimError::EmptyPath {
                mission_id: "preview".to_string(),
                pattern,
            });
        }
        Ok(path)
    }

    async fn request<T>(
        &self,
        mission_id: &str,
        make: impl FnOnce(oneshot::Sender<T>) -> SimCommand,
    ) -> SimResult<T> {
        let commands = self
            .handles
            .get(mission_id)
            .map(|handle| handle.commands.clone())
            .ok_or_else(|| SimError::NotRunning(mission_id.to_string()))?;

        let (ack_tx, ack_rx) = oneshot::channel();
        commands
            .send(make(ack_tx))
            .await
            .map_err(|_| SimError::NotRunning(mission_id.to_string()))?;
        ack_rx
            .await
            .map_err(|_| SimError::NotRunning(mission_id.to_string()))
    }
}
