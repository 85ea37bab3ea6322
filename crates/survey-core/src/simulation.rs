//! Per-mission simulation state machine.
//!
//! [`MissionSim`] owns one drone's [`FlightDynamics`], the flight path and
//! the waypoint cursor. It is driven by calling [`MissionSim::tick`] at a
//! fixed rate and returns the events each call produced, in order.
//! Scheduling, cancellation and publishing live in the server.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::dynamics::{DynamicsState, FlightDynamics};
use crate::error::{SimError, SimResult};
use crate::events::{
    MissionProgressEvent, MissionStatus, MissionStatusEvent, SimEvent, TelemetryEvent,
};
use crate::lifecycle::LifecycleState;
use crate::models::{
    FlightPath, FlightPattern, GeoPoint, MissionDescriptor, MissionOutcome, OutcomeStatus,
    Waypoint,
};
use crate::path_generator;
use crate::rules::SimRules;
use crate::spatial::turn_angle_deg;

/// Progress never reports 100 before the mission is actually completed.
const MAX_RUNNING_PROGRESS: f64 = 99.9;

/// Point-in-time view of a running mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub mission_id: String,
    pub drone_id: String,
    pub pattern: FlightPattern,
    pub dynamics: DynamicsState,
    pub cursor: usize,
    pub total_waypoints: usize,
    pub progress_pct: f64,
    pub cruise_speed_mps: f64,
    pub home: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_from: Option<LifecycleState>,
    pub manual_rth: bool,
    pub flight_time_s: f64,
}

#[derive(Debug, Clone)]
pub struct MissionSim {
    mission_id: String,
    drone_id: String,
    path: FlightPath,
    home: GeoPoint,
    rules: SimRules,
    dynamics: FlightDynamics,
    cursor: usize,
    started: bool,
    manual_rth: bool,
    hover_remaining_s: f64,
    progress_pct: f64,
    total_distance_m: f64,
    flight_time_s: f64,
    ticks: u64,
    start_battery_pct: f64,
    outcome: Option<MissionOutcome>,
}

impl MissionSim {
    /// Validate the descriptor, synthesize its path and build a
    /// simulation ready to [`start`](Self::start).
    pub fn from_descriptor(
        descriptor: &MissionDescriptor,
        pattern_override: Option<FlightPattern>,
        rules: SimRules,
    ) -> SimResult<Self> {
        let errors = descriptor.validate();
        if !errors.is_empty() {
            return Err(SimError::Configuration(format!(
                "mission {}: {}",
                descriptor.mission_id,
                errors.join("; ")
            )));
        }
        let rule_errors = rules.validate();
        if !rule_errors.is_empty() {
            return Err(SimError::Configuration(rule_errors.join("; ")));
        }

        let pattern = pattern_override.unwrap_or(descriptor.pattern);
        let path = path_generator::generate(&descriptor.area, pattern, &descriptor.path_params());
        Self::new(descriptor, path, rules)
    }

    /// Build a simulation over an already generated path.
    pub fn new(descriptor: &MissionDescriptor, path: FlightPath, rules: SimRules) -> SimResult<Self> {
        let Some(first) = path.get(0).map(Waypoint::position) else {
            return Err(SimError::EmptyPath {
                mission_id: descriptor.mission_id.clone(),
                pattern: path.pattern,
            });
        };
        let home = descriptor.home.unwrap_or(first);

        let dynamics = FlightDynamics::new(
            descriptor.drone.clone(),
            home,
            descriptor.initial_battery_pct,
            descriptor.cruise_speed_mps,
            descriptor.altitude_m,
        );
        let start_battery_pct = dynamics.state().battery_pct;

        let last = path.waypoints.last().map_or(first, Waypoint::position);
        let total_distance_m =
            home.distance_to(&first) + path.total_distance_m() + last.distance_to(&home);

        Ok(Self {
            mission_id: descriptor.mission_id.clone(),
            drone_id: descriptor.drone_id.clone(),
            path,
            home,
            rules,
            dynamics,
            cursor: 0,
            started: false,
            manual_rth: false,
            hover_remaining_s: 0.0,
            progress_pct: 0.0,
            total_distance_m,
            flight_time_s: 0.0,
            ticks: 0,
            start_battery_pct,
            outcome: None,
        })
    }

    pub fn mission_id(&self) -> &str {
        &self.mission_id
    }

    pub fn drone_id(&self) -> &str {
        &self.drone_id
    }

    pub fn path(&self) -> &FlightPath {
        &self.path
    }

    pub fn rules(&self) -> &SimRules {
        &self.rules
    }

    pub fn state(&self) -> &DynamicsState {
        self.dynamics.state()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.dynamics.lifecycle()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn progress_pct(&self) -> f64 {
        self.progress_pct
    }

    pub fn is_finished(&self) -> bool {
        self.lifecycle().is_terminal()
    }

    /// Terminal outcome, available once the mission completed or aborted.
    pub fn outcome(&self) -> Option<&MissionOutcome> {
        self.outcome.as_ref()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            mission_id: self.mission_id.clone(),
            drone_id: self.drone_id.clone(),
            pattern: self.path.pattern,
            dynamics: *self.dynamics.state(),
            cursor: self.cursor,
            total_waypoints: self.path.len(),
            progress_pct: self.progress_pct,
            cruise_speed_mps: self.dynamics.cruise_speed_mps(),
            home: self.home,
            paused_from: self.dynamics.paused_from(),
            manual_rth: self.manual_rth,
            flight_time_s: self.flight_time_s,
        }
    }

    /// IDLE -> TAKEOFF. Emits the `started` status with the flight path.
    pub fn start(&mut self) -> SimResult<Vec<SimEvent>> {
        if self.started {
            return Err(SimError::InvalidCommand(format!(
                "mission {} already started",
                self.mission_id
            )));
        }
        self.dynamics.transition(LifecycleState::Takeoff)?;
        self.started = true;
        tracing::info!(
            mission_id = %self.mission_id,
            drone_id = %self.drone_id,
            pattern = %self.path.pattern,
            waypoints = self.path.len(),
            "mission started"
        );

        Ok(vec![
            self.status_event(MissionStatus::Started, None),
            self.telemetry_event(),
            self.progress_event(),
        ])
    }

    /// Advance one tick of `rules.dt()` simulated seconds.
    pub fn tick(&mut self) -> Vec<SimEvent> {
        let dt = self.rules.dt();
        self.tick_dt(dt)
    }

    /// Advance one tick of `dt` simulated seconds.
    ///
    /// Paused, terminal and not-yet-started missions do not advance and
    /// produce no events.
    pub fn tick_dt(&mut self, dt: f64) -> Vec<SimEvent> {
        let before = self.lifecycle();
        if !self.started || before == LifecycleState::Paused || before.is_terminal() {
            return Vec::new();
        }

        self.ticks += 1;
        if before.is_airborne() && dt.is_finite() && dt > 0.0 {
            self.flight_time_s += dt;
        }

        let target = self.current_target();
        self.dynamics.set_maneuvering(self.approaching_sharp_turn());
        self.dynamics.update(dt, target.as_ref());

        let mut events = Vec::new();
        if let Err(err) = self.evaluate_transitions(dt) {
            tracing::error!(
                mission_id = %self.mission_id,
                error = %err,
                "lifecycle invariant violated; aborting mission"
            );
            return self.abort(&format!("internal error: {err}"));
        }

        self.update_progress();
        let after = self.lifecycle();
        events.push(self.telemetry_event());

        if after == LifecycleState::Completed {
            events.push(self.progress_event());
            events.push(self.status_event(MissionStatus::Completed, None));
            return events;
        }

        if after != before || self.ticks % self.rules.progress_interval_ticks.max(1) == 0 {
            events.push(self.progress_event());
        }
        events
    }

    /// Suspend ticking, retaining all state.
    pub fn pause(&mut self) -> SimResult<Vec<SimEvent>> {
        let current = self.lifecycle();
        if !current.is_active() {
            return Err(SimError::InvalidCommand(format!(
                "cannot pause mission {} in state {current}",
                self.mission_id
            )));
        }
        self.dynamics.transition(LifecycleState::Paused)?;
        tracing::info!(mission_id = %self.mission_id, from = %current, "mission paused");
        Ok(vec![self.telemetry_event()])
    }

    /// Return to the state the mission was paused from.
    pub fn resume(&mut self) -> SimResult<Vec<SimEvent>> {
        let Some(previous) = self
            .dynamics
            .paused_from()
            .filter(|_| self.lifecycle() == LifecycleState::Paused)
        else {
            return Err(SimError::InvalidCommand(format!(
                "mission {} is not paused",
                self.mission_id
            )));
        };
        self.dynamics.transition(previous)?;
        tracing::info!(mission_id = %self.mission_id, to = %previous, "mission resumed");
        Ok(vec![self.telemetry_event()])
    }

    /// Change the commanded cruise speed. Returns the clamped value applied.
    pub fn set_speed(&mut self, speed_mps: f64) -> SimResult<f64> {
        if self.is_finished() {
            return Err(SimError::InvalidCommand(format!(
                "mission {} already finished",
                self.mission_id
            )));
        }
        let applied = self.dynamics.set_cruise_speed(speed_mps)?;
        tracing::info!(
            mission_id = %self.mission_id,
            requested = speed_mps,
            applied,
            "cruise speed changed"
        );
        Ok(applied)
    }

    /// Abandon the remaining coverage and fly home.
    ///
    /// A mission paused in flight resumes ticking in RTH. A mission already
    /// on its way home, or paused there, only records that coverage will not
    /// resume after landing.
    pub fn trigger_rth(&mut self) -> SimResult<Vec<SimEvent>> {
        let current = self.lifecycle();
        match current {
            LifecycleState::Takeoff | LifecycleState::Flying | LifecycleState::Hovering => {
                self.dynamics.transition(LifecycleState::Rth)?;
            }
            LifecycleState::Paused => {
                let turns_home = self
                    .dynamics
                    .paused_from()
                    .is_some_and(|from| from.can_transition_to(LifecycleState::Rth));
                if turns_home {
                    self.dynamics.transition(LifecycleState::Rth)?;
                }
            }
            LifecycleState::Rth | LifecycleState::Landing | LifecycleState::Charging => {}
            LifecycleState::Idle if self.started => {}
            _ => {
                return Err(SimError::InvalidCommand(format!(
                    "cannot return mission {} home from state {current}",
                    self.mission_id
                )));
            }
        }
        self.manual_rth = true;
        tracing::info!(mission_id = %self.mission_id, from = %current, "return to home requested");
        Ok(vec![self.telemetry_event()])
    }

    /// Move to ABORTED and emit the terminal status. No-op once terminal.
    pub fn abort(&mut self, reason: &str) -> Vec<SimEvent> {
        if self.is_finished() {
            return Vec::new();
        }
        if let Err(err) = self.dynamics.transition(LifecycleState::Aborted) {
            tracing::error!(mission_id = %self.mission_id, error = %err, "abort rejected");
            return Vec::new();
        }
        self.record_outcome(OutcomeStatus::Aborted, Some(reason.to_string()));
        tracing::info!(mission_id = %self.mission_id, reason, "mission aborted");

        vec![
            self.telemetry_event(),
            self.status_event(MissionStatus::Aborted, Some(reason.to_string())),
        ]
    }

    fn current_target(&self) -> Option<Waypoint> {
        match self.lifecycle() {
            LifecycleState::Flying => self.path.get(self.cursor).copied(),
            LifecycleState::Rth | LifecycleState::Landing => Some(Waypoint {
                index: self.path.len(),
                lat: self.home.lat,
                lon: self.home.lon,
                altitude_m: self.dynamics.cruise_altitude_m(),
            }),
            _ => None,
        }
    }

    fn battery_low(&self) -> bool {
        self.dynamics.state().battery_pct < self.rules.rth_battery_pct
    }

    fn within_arrival(&self, point: &GeoPoint) -> bool {
        self.dynamics.state().position.distance_to(point) <= self.rules.arrival_radius_m
    }

    fn turn_at(&self, index: usize) -> f64 {
        if index == 0 || index + 1 >= self.path.len() {
            return 0.0;
        }
        let w = &self.path.waypoints;
        turn_angle_deg(
            (w[index - 1].lat, w[index - 1].lon),
            (w[index].lat, w[index].lon),
            (w[index + 1].lat, w[index + 1].lon),
        )
    }

    fn is_sharp_turn(&self, index: usize) -> bool {
        self.rules.sharp_turn_deg > 0.0 && self.turn_at(index) >= self.rules.sharp_turn_deg
    }

    fn approaching_sharp_turn(&self) -> bool {
        if self.lifecycle() != LifecycleState::Flying {
            return false;
        }
        match self.path.get(self.cursor) {
            Some(wp) => {
                self.is_sharp_turn(self.cursor)
                    && self.dynamics.state().position.distance_to(&wp.position())
                        <= self.rules.maneuver_lead_m
            }
            None => false,
        }
    }

    fn hovers_at(&self, index: usize) -> bool {
        let every = self.rules.hover_every_n;
        let periodic = every > 0 && (index + 1) % every == 0;
        (periodic || self.is_sharp_turn(index)) && self.rules.hover_duration_s > 0.0
    }

    fn go_home(&mut self, reason: &str) -> SimResult<()> {
        self.dynamics.transition(LifecycleState::Rth)?;
        tracing::info!(
            mission_id = %self.mission_id,
            battery_pct = self.dynamics.state().battery_pct,
            cursor = self.cursor,
            reason,
            "returning to home"
        );
        Ok(())
    }

    fn evaluate_transitions(&mut self, dt: f64) -> SimResult<()> {
        let state = *self.dynamics.state();
        match state.state {
            LifecycleState::Takeoff => {
                if self.battery_low() {
                    self.go_home("low battery")?;
                } else if state.altitude_m >= self.dynamics.cruise_altitude_m() {
                    self.dynamics.transition(LifecycleState::Flying)?;
                }
            }
            LifecycleState::Flying => {
                if self.battery_low() {
                    return self.go_home("low battery");
                }
                let Some(target) = self.path.get(self.cursor).copied() else {
                    return self.go_home("coverage complete");
                };
                if !self.within_arrival(&target.position()) {
                    return Ok(());
                }
                self.cursor += 1;
                tracing::debug!(
                    mission_id = %self.mission_id,
                    waypoint = target.index,
                    remaining = self.path.len() - self.cursor,
                    "waypoint reached"
                );
                if self.cursor >= self.path.len() {
                    self.go_home("coverage complete")?;
                } else if self.hovers_at(target.index) {
                    self.dynamics.transition(LifecycleState::Hovering)?;
                    self.hover_remaining_s = self.rules.hover_duration_s;
                }
            }
            LifecycleState::Hovering => {
                if self.battery_low() {
                    return self.go_home("low battery");
                }
                self.hover_remaining_s -= dt;
                if self.hover_remaining_s <= 0.0 {
                    self.dynamics.transition(LifecycleState::Flying)?;
                }
            }
            LifecycleState::Rth => {
                if self.within_arrival(&self.home) {
                    self.dynamics.transition(LifecycleState::Landing)?;
                }
            }
            LifecycleState::Landing => {
                if state.altitude_m <= 0.0 {
                    self.dynamics.transition(LifecycleState::Charging)?;
                }
            }
            LifecycleState::Idle => {
                if self.cursor < self.path.len() && !self.manual_rth {
                    tracing::info!(
                        mission_id = %self.mission_id,
                        cursor = self.cursor,
                        "recharged; resuming coverage"
                    );
                    self.dynamics.transition(LifecycleState::Takeoff)?;
                } else {
                    self.dynamics.transition(LifecycleState::Completed)?;
                    self.progress_pct = 100.0;
                    self.record_outcome(OutcomeStatus::Completed, None);
                    tracing::info!(
                        mission_id = %self.mission_id,
                        flight_time_s = self.flight_time_s,
                        "mission completed"
                    );
                }
            }
            LifecycleState::Charging
            | LifecycleState::Paused
            | LifecycleState::Aborted
            | LifecycleState::Completed => {}
        }
        Ok(())
    }

    /// Remaining distance to fly, including the leg back home.
    fn remaining_distance_m(&self) -> f64 {
        let state = self.dynamics.state();
        let to_home = state.position.distance_to(&self.home);
        let Some(next) = self.path.get(self.cursor).map(Waypoint::position) else {
            return to_home;
        };
        let return_leg = self
            .path
            .waypoints
            .last()
            .map_or(0.0, |w| w.position().distance_to(&self.home));
        let coverage = self.path.distance_from(self.cursor) + return_leg;

        match state.state {
            LifecycleState::Rth
            | LifecycleState::Landing
            | LifecycleState::Charging
            | LifecycleState::Idle => {
                if self.manual_rth {
                    to_home
                } else {
                    to_home + self.home.distance_to(&next) + coverage
                }
            }
            _ => state.position.distance_to(&next) + coverage,
        }
    }

    fn update_progress(&mut self) {
        if self.lifecycle() == LifecycleState::Completed {
            self.progress_pct = 100.0;
            return;
        }
        if self.total_distance_m <= 0.0 {
            return;
        }
        let done = 1.0 - self.remaining_distance_m() / self.total_distance_m;
        let pct = (done * 100.0).clamp(0.0, MAX_RUNNING_PROGRESS);
        if pct.is_finite() {
            self.progress_pct = self.progress_pct.max(pct);
        }
    }

    fn eta_s(&self) -> f64 {
        if self.lifecycle() == LifecycleState::Completed {
            return 0.0;
        }
        let speed = self.dynamics.cruise_speed_mps();
        if speed > 0.0 {
            self.remaining_distance_m() / speed
        } else {
            0.0
        }
    }

    fn record_outcome(&mut self, status: OutcomeStatus, reason: Option<String>) {
        self.outcome = Some(MissionOutcome {
            mission_id: self.mission_id.clone(),
            drone_id: self.drone_id.clone(),
            status,
            waypoints_visited: self.cursor,
            total_waypoints: self.path.len(),
            flight_time_s: self.flight_time_s,
            battery_used_pct: (self.start_battery_pct - self.dynamics.state().battery_pct)
                .max(0.0),
            reason,
            finished_at: Utc::now(),
        });
    }

    fn telemetry_event(&self) -> SimEvent {
        SimEvent::Telemetry(TelemetryEvent::from_state(
            &self.mission_id,
            &self.drone_id,
            self.dynamics.state(),
        ))
    }

    fn progress_event(&self) -> SimEvent {
        SimEvent::MissionProgress(MissionProgressEvent {
            mission_id: self.mission_id.clone(),
            drone_id: self.drone_id.clone(),
            percentage: self.progress_pct,
            eta_s: self.eta_s(),
            waypoint_index: self.cursor,
            total_waypoints: self.path.len(),
            timestamp: Utc::now(),
        })
    }

    fn status_event(&self, status: MissionStatus, reason: Option<String>) -> SimEvent {
        SimEvent::MissionStatus(MissionStatusEvent {
            mission_id: self.mission_id.clone(),
            drone_id: self.drone_id.clone(),
            status,
            flight_path: self.path.waypoints.clone(),
            reason,
            timestamp: Utc::now(),
        })
    }
}
