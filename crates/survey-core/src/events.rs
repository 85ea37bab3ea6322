//! Events emitted by a running mission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dynamics::DynamicsState;
use crate::lifecycle::LifecycleState;
use crate::models::Waypoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    Telemetry(TelemetryEvent),
    MissionStatus(MissionStatusEvent),
    MissionProgress(MissionProgressEvent),
}

impl SimEvent {
    pub fn mission_id(&self) -> &str {
        match self {
            SimEvent::Telemetry(e) => &e.mission_id,
            SimEvent::MissionStatus(e) => &e.mission_id,
            SimEvent::MissionProgress(e) => &e.mission_id,
        }
    }

    pub fn drone_id(&self) -> &str {
        match self {
            SimEvent::Telemetry(e) => &e.drone_id,
            SimEvent::MissionStatus(e) => &e.drone_id,
            SimEvent::MissionProgress(e) => &e.drone_id,
        }
    }
}

/// Per-tick position and battery report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub mission_id: String,
    pub drone_id: String,
    pub lat: f64,
    pub lon: f64,
    pub altitude_m: f64,
    pub speed_mps: f64,
    pub battery_pct: f64,
    pub heading_deg: f64,
    pub state: LifecycleState,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn from_state(mission_id: &str, drone_id: &str, state: &DynamicsState) -> Self {
        Self {
            mission_id: mission_id.to_string(),
            drone_id: drone_id.to_string(),
            lat: state.position.lat,
            lon: state.position.lon,
            altitude_m: state.altitude_m,
            speed_mps: state.speed_mps,
            battery_pct: state.battery_pct,
            heading_deg: state.heading_deg,
            state: state.state,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Started,
    Completed,
    Aborted,
}

/// Emitted once at start and once at the terminal transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionStatusEvent {
    pub mission_id: String,
    pub drone_id: String,
    pub status: MissionStatus,
    pub flight_path: Vec<Waypoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionProgressEvent {
    pub mission_id: String,
    pub drone_id: String,
    /// Non-decreasing, exactly 100 once completed
    pub percentage: f64,
    /// Estimated seconds remaining at the current cruise speed
    pub eta_s: f64,
    pub waypoint_index: usize,
    pub total_waypoints: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    #[test]
    fn events_are_tagged_by_type() {
        let state = DynamicsState::on_ground(GeoPoint::new(33.0, -117.0), 88.0);
        let event = SimEvent::Telemetry(TelemetryEvent::from_state("m-1", "d-1", &state));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "telemetry");
        assert_eq!(json["state"], "IDLE");
        assert_eq!(json["battery_pct"], 88.0);
        assert_eq!(event.mission_id(), "m-1");
        assert_eq!(event.drone_id(), "d-1");
    }

    #[test]
    fn status_omits_missing_reason() {
        let event = SimEvent::MissionStatus(MissionStatusEvent {
            mission_id: "m-1".into(),
            drone_id: "d-1".into(),
            status: MissionStatus::Started,
            flight_path: vec![],
            reason: None,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "mission_status");
        assert_eq!(json["status"], "started");
        assert!(json.get("reason").is_none());

        let back: SimEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
