//! Error taxonomy for the simulation core.

use thiserror::Error;

use crate::lifecycle::LifecycleState;
use crate::models::FlightPattern;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Missing or invalid survey polygon, unresolvable mission or drone.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The path generator produced no waypoints.
    #[error("mission {mission_id}: {pattern} pattern produced an empty flight path")]
    EmptyPath {
        mission_id: String,
        pattern: FlightPattern,
    },

    /// A lifecycle edge outside the transition graph was attempted.
    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("no active simulation for mission {0}")]
    NotRunning(String),

    /// Well-formed command that cannot apply in the current state.
    #[error("command rejected: {0}")]
    InvalidCommand(String),
}

pub type SimResult<T> = Result<T, SimError>;
