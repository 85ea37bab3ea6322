//! Drone lifecycle states and the transition graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one simulated drone during a mission run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// On the ground, ready
    #[default]
    Idle,
    /// Climbing to cruise altitude
    Takeoff,
    /// Following the coverage path
    Flying,
    /// Holding position at a pause point
    Hovering,
    /// Returning to home
    Rth,
    /// Descending at home
    Landing,
    /// On the ground, recharging
    Charging,
    /// Tick suspended by operator
    Paused,
    /// Terminated by operator or fault
    Aborted,
    /// Mission finished
    Completed,
}

impl LifecycleState {
    /// States that advance under the tick and can be paused or aborted.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            LifecycleState::Takeoff
                | LifecycleState::Flying
                | LifecycleState::Hovering
                | LifecycleState::Rth
                | LifecycleState::Landing
                | LifecycleState::Charging
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Aborted | LifecycleState::Completed)
    }

    pub fn is_airborne(self) -> bool {
        matches!(
            self,
            LifecycleState::Takeoff
                | LifecycleState::Flying
                | LifecycleState::Hovering
                | LifecycleState::Rth
                | LifecycleState::Landing
        )
    }

    /// Whether `self -> to` is an edge of the lifecycle graph.
    ///
    /// Leaving PAUSED for anything but ABORTED depends on the state the
    /// mission was paused from; see [`can_leave_pause`](Self::can_leave_pause).
    pub fn can_transition_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;

        if self.is_terminal() {
            return false;
        }
        if to == Aborted {
            return true;
        }
        if to == Paused {
            return self.is_active();
        }

        match (self, to) {
            (Idle, Takeoff) | (Idle, Completed) => true,
            (Takeoff, Flying) | (Takeoff, Rth) => true,
            (Flying, Hovering) | (Flying, Rth) => true,
            (Hovering, Flying) | (Hovering, Rth) => true,
            (Rth, Landing) => true,
            (Landing, Charging) => true,
            (Charging, Idle) => true,
            _ => false,
        }
    }

    /// Edges out of PAUSED for a mission paused from `paused_from`: back
    /// into that state, to RTH when `paused_from` could turn for home
    /// itself, or to ABORTED.
    pub fn can_leave_pause(paused_from: LifecycleState, to: LifecycleState) -> bool {
        if !paused_from.is_active() {
            return to == LifecycleState::Aborted;
        }
        to == paused_from
            || to == LifecycleState::Aborted
            || (to == LifecycleState::Rth && paused_from.can_transition_to(LifecycleState::Rth))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Idle => "IDLE",
            LifecycleState::Takeoff => "TAKEOFF",
            LifecycleState::Flying => "FLYING",
            LifecycleState::Hovering => "HOVERING",
            LifecycleState::Rth => "RTH",
            LifecycleState::Landing => "LANDING",
            LifecycleState::Charging => "CHARGING",
            LifecycleState::Paused => "PAUSED",
            LifecycleState::Aborted => "ABORTED",
            LifecycleState::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
