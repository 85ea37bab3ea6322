//! Point-mass flight dynamics for one simulated drone.
//!
//! The integrator is a pure step `(state, dt, target) -> state'`
//! ([`FlightDynamics::advance`]); [`FlightDynamics::update`] commits the
//! result only when every field is finite.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::lifecycle::LifecycleState;
use crate::models::{GeoPoint, Waypoint};
use crate::spatial::{bearing, normalize_heading, offset_by_bearing};

/// Below this distance the drone is considered on top of its target.
const ON_TARGET_M: f64 = 0.01;

/// Battery drain and charge rates, in percent per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryModel {
    /// Constant avionics/hover load
    pub base_drain_pct_s: f64,
    /// Additional drain at full speed, scaled by speed / max speed
    pub speed_drain_pct_s: f64,
    /// Multiplier applied while setting up for a sharp turn
    pub maneuver_multiplier: f64,
    /// Extra fraction of drain while climbing at the full climb rate
    pub climb_factor: f64,
    pub charge_rate_pct_s: f64,
}

impl Default for BatteryModel {
    fn default() -> Self {
        Self {
            base_drain_pct_s: 0.05,
            speed_drain_pct_s: 0.10,
            maneuver_multiplier: 1.5,
            climb_factor: 0.5,
            charge_rate_pct_s: 2.0,
        }
    }
}

impl BatteryModel {
    /// Drain in percent per second for the given flight condition.
    pub fn drain_rate(
        &self,
        speed_mps: f64,
        max_speed_mps: f64,
        climb_mps: f64,
        climb_rate_mps: f64,
        maneuvering: bool,
    ) -> f64 {
        let speed_ratio = if max_speed_mps > 0.0 {
            (speed_mps / max_speed_mps).max(0.0)
        } else {
            0.0
        };
        let mut rate = self.base_drain_pct_s + speed_ratio * self.speed_drain_pct_s;
        if maneuvering {
            rate *= self.maneuver_multiplier;
        }
        if climb_mps > 0.0 && climb_rate_mps > 0.0 {
            rate *= 1.0 + self.climb_factor * (climb_mps / climb_rate_mps).min(1.0);
        }
        rate
    }
}

/// Airframe limits for a simulated drone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DroneProfile {
    pub max_speed_mps: f64,
    pub min_speed_mps: f64,
    pub acceleration_mps2: f64,
    pub deceleration_mps2: f64,
    pub climb_rate_mps: f64,
    pub descent_rate_mps: f64,
    pub battery: BatteryModel,
}

impl Default for DroneProfile {
    fn default() -> Self {
        Self {
            max_speed_mps: 15.0,
            min_speed_mps: 0.5,
            acceleration_mps2: 2.0,
            deceleration_mps2: 3.0,
            climb_rate_mps: 3.0,
            descent_rate_mps: 2.0,
            battery: BatteryModel::default(),
        }
    }
}

impl DroneProfile {
    /// Returns list of validation errors (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let positive = [
            ("max_speed_mps", self.max_speed_mps),
            ("acceleration_mps2", self.acceleration_mps2),
            ("deceleration_mps2", self.deceleration_mps2),
            ("climb_rate_mps", self.climb_rate_mps),
            ("descent_rate_mps", self.descent_rate_mps),
            ("charge_rate_pct_s", self.battery.charge_rate_pct_s),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("Drone {name} must be positive (got {value})"));
            }
        }
        let non_negative = [
            ("min_speed_mps", self.min_speed_mps),
            ("base_drain_pct_s", self.battery.base_drain_pct_s),
            ("speed_drain_pct_s", self.battery.speed_drain_pct_s),
            ("maneuver_multiplier", self.battery.maneuver_multiplier),
            ("climb_factor", self.battery.climb_factor),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("Drone {name} must be non-negative (got {value})"));
            }
        }
        if self.min_speed_mps > self.max_speed_mps {
            errors.push(format!(
                "Drone min speed ({}) exceeds max speed ({})",
                self.min_speed_mps, self.max_speed_mps
            ));
        }
        errors
    }

    pub fn clamp_speed(&self, speed_mps: f64) -> f64 {
        speed_mps.clamp(self.min_speed_mps, self.max_speed_mps)
    }
}

/// Observable physical state of a drone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsState {
    pub position: GeoPoint,
    pub altitude_m: f64,
    pub speed_mps: f64,
    /// Degrees clockwise from north, [0, 360)
    pub heading_deg: f64,
    /// Percent, always within [0, 100]
    pub battery_pct: f64,
    pub state: LifecycleState,
}

impl DynamicsState {
    /// Parked at `position` in the IDLE state.
    pub fn on_ground(position: GeoPoint, battery_pct: f64) -> Self {
        Self {
            position,
            altitude_m: 0.0,
            speed_mps: 0.0,
            heading_deg: 0.0,
            battery_pct: battery_pct.clamp(0.0, 100.0),
            state: LifecycleState::Idle,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.altitude_m.is_finite()
            && self.speed_mps.is_finite()
            && self.heading_deg.is_finite()
            && self.battery_pct.is_finite()
    }
}

/// One drone's state plus the integrator that advances it.
#[derive(Debug, Clone)]
pub struct FlightDynamics {
    profile: DroneProfile,
    state: DynamicsState,
    cruise_speed_mps: f64,
    cruise_altitude_m: f64,
    maneuvering: bool,
    paused_from: Option<LifecycleState>,
}

impl FlightDynamics {
    /// Parked drone at `home` with the given battery level.
    pub fn new(
        profile: DroneProfile,
        home: GeoPoint,
        battery_pct: f64,
        cruise_speed_mps: f64,
        cruise_altitude_m: f64,
    ) -> Self {
        Self::with_state(
            profile,
            DynamicsState::on_ground(home, battery_pct),
            cruise_speed_mps,
            cruise_altitude_m,
        )
    }

    pub fn with_state(
        profile: DroneProfile,
        state: DynamicsState,
        cruise_speed_mps: f64,
        cruise_altitude_m: f64,
    ) -> Self {
        let cruise_speed_mps = profile.clamp_speed(cruise_speed_mps);
        Self {
            profile,
            state,
            cruise_speed_mps,
            cruise_altitude_m,
            maneuvering: false,
            paused_from: None,
        }
    }

    pub fn state(&self) -> &DynamicsState {
        &self.state
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.state.state
    }

    pub fn profile(&self) -> &DroneProfile {
        &self.profile
    }

    /// State held before the current pause, if paused.
    pub fn paused_from(&self) -> Option<LifecycleState> {
        self.paused_from
    }

    pub fn cruise_speed_mps(&self) -> f64 {
        self.cruise_speed_mps
    }

    pub fn cruise_altitude_m(&self) -> f64 {
        self.cruise_altitude_m
    }

    /// Set the commanded speed, clamped to the airframe limits.
    /// Returns the speed actually applied.
    pub fn set_cruise_speed(&mut self, speed_mps: f64) -> SimResult<f64> {
        if !speed_mps.is_finite() {
            return Err(SimError::InvalidCommand(format!(
                "speed must be a finite number (got {speed_mps})"
            )));
        }
        self.cruise_speed_mps = self.profile.clamp_speed(speed_mps);
        Ok(self.cruise_speed_mps)
    }

    /// Hint that the drone is setting up for a sharp turn.
    pub fn set_maneuvering(&mut self, maneuvering: bool) {
        self.maneuvering = maneuvering;
    }

    /// Move to another lifecycle state along a graph edge.
    ///
    /// Out of PAUSED only the paused-from state, RTH (when that state
    /// could have turned home) and ABORTED are reachable.
    pub fn transition(&mut self, to: LifecycleState) -> SimResult<()> {
        let from = self.state.state;
        let allowed = match (from, self.paused_from) {
            (LifecycleState::Paused, Some(paused_from)) => {
                LifecycleState::can_leave_pause(paused_from, to)
            }
            _ => from.can_transition_to(to),
        };
        if !allowed {
            return Err(SimError::InvalidTransition { from, to });
        }
        self.paused_from = (to == LifecycleState::Paused).then_some(from);
        self.state.state = to;
        if to == LifecycleState::Charging {
            self.state.speed_mps = 0.0;
        }
        Ok(())
    }

    /// Advance one tick toward `target`.
    ///
    /// A non-finite target is ignored (the drone holds for this tick) and
    /// a non-finite result is discarded in favour of the previous state.
    pub fn update(&mut self, dt: f64, target: Option<&Waypoint>) {
        let target = match target {
            Some(t) if !t.is_finite() => {
                tracing::warn!(index = t.index, "ignoring non-finite target waypoint; holding");
                None
            }
            other => other,
        };

        let next = self.advance(dt, target);
        if next.is_finite() {
            self.state = next;
        } else {
            tracing::warn!(
                state = %self.state.state,
                dt,
                "rejected tick producing non-finite dynamics state"
            );
        }
    }

    /// Pure integration step; does not modify `self`.
    pub fn advance(&self, dt: f64, target: Option<&Waypoint>) -> DynamicsState {
        let mut next = self.state;
        if !dt.is_finite() || dt <= 0.0 {
            return next;
        }

        match next.state {
            LifecycleState::Idle
            | LifecycleState::Paused
            | LifecycleState::Aborted
            | LifecycleState::Completed => return next,
            LifecycleState::Charging => {
                next.speed_mps = 0.0;
                next.battery_pct += self.profile.battery.charge_rate_pct_s * dt;
                if next.battery_pct >= 100.0 {
                    next.battery_pct = 100.0;
                    next.state = LifecycleState::Idle;
                }
                return next;
            }
            LifecycleState::Takeoff => {
                next.speed_mps = self.brake(next.speed_mps, dt);
                let climb = self.approach_altitude(&mut next, self.cruise_altitude_m, dt);
                self.drain(&mut next, climb, dt);
            }
            LifecycleState::Hovering => {
                next.speed_mps = self.brake(next.speed_mps, dt);
                self.drain(&mut next, 0.0, dt);
            }
            LifecycleState::Landing => {
                match target {
                    Some(t) => self.fly_toward(&mut next, &t.position(), dt),
                    None => next.speed_mps = self.brake(next.speed_mps, dt),
                }
                let climb = self.approach_altitude(&mut next, 0.0, dt);
                self.drain(&mut next, climb, dt);
            }
            LifecycleState::Flying | LifecycleState::Rth => {
                let Some(t) = target else {
                    return next;
                };
                self.fly_toward(&mut next, &t.position(), dt);
                let target_alt = if next.state == LifecycleState::Flying {
                    t.altitude_m
                } else {
                    self.cruise_altitude_m
                };
                let climb = self.approach_altitude(&mut next, target_alt, dt);
                self.drain(&mut next, climb, dt);
            }
        }

        next.battery_pct = next.battery_pct.clamp(0.0, 100.0);
        next
    }

    fn fly_toward(&self, next: &mut DynamicsState, target: &GeoPoint, dt: f64) {
        let distance = next.position.distance_to(target);
        let desired = if distance < ON_TARGET_M {
            0.0
        } else {
            distance
                .max(self.profile.min_speed_mps)
                .min(self.cruise_speed_mps)
        };

        next.speed_mps = if desired > next.speed_mps {
            (next.speed_mps + self.profile.acceleration_mps2 * dt).min(desired)
        } else {
            (next.speed_mps - self.profile.deceleration_mps2 * dt).max(desired)
        }
        .clamp(0.0, self.profile.max_speed_mps);

        if distance < ON_TARGET_M {
            return;
        }

        let heading_rad = bearing(next.position.lat, next.position.lon, target.lat, target.lon);
        let step = next.speed_mps * dt;
        if step >= distance {
            next.position = *target;
        } else {
            let (lat, lon) =
                offset_by_bearing(next.position.lat, next.position.lon, step, heading_rad);
            next.position = GeoPoint::new(lat, lon);
        }
        next.heading_deg = normalize_heading(heading_rad.to_degrees());
    }

    fn brake(&self, speed_mps: f64, dt: f64) -> f64 {
        (speed_mps - self.profile.deceleration_mps2 * dt).max(0.0)
    }

    /// Move altitude toward `target_m` at the bounded climb/descent rate.
    /// Returns the vertical speed used (positive = climbing).
    fn approach_altitude(&self, next: &mut DynamicsState, target_m: f64, dt: f64) -> f64 {
        let diff = target_m - next.altitude_m;
        let delta = if diff > 0.0 {
            diff.min(self.profile.climb_rate_mps * dt)
        } else {
            diff.max(-self.profile.descent_rate_mps * dt)
        };
        next.altitude_m = if delta == diff {
            target_m
        } else {
            next.altitude_m + delta
        };
        delta / dt
    }

    fn drain(&self, next: &mut DynamicsState, climb_mps: f64, dt: f64) {
        let rate = self.profile.battery.drain_rate(
            next.speed_mps,
            self.profile.max_speed_mps,
            climb_mps,
            self.profile.climb_rate_mps,
            self.maneuvering,
        );
        next.battery_pct -= rate * dt;
    }
}
