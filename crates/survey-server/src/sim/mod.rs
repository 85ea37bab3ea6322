//! Concurrent mission simulations.

pub mod registry;
mod task;

pub use registry::{ActiveMission, MissionHandle, SimulationRegistry, StartOutcome};
