//! Simulation control handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use survey_core::{FlightPattern, SimSnapshot};

use crate::api::{sim_error, ApiError};
use crate::sim::{ActiveMission, StartOutcome};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    /// Overrides the pattern stored with the mission
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpeedRequest {
    pub speed_mps: f64,
}

pub async fn list_simulations(State(state): State<Arc<AppState>>) -> Json<Vec<ActiveMission>> {
    Json(state.registry().active())
}

pub async fn get_simulation(
    State(state): State<Arc<AppState>>,
    Path(mission_id): Path<String>,
) -> Result<Json<SimSnapshot>, ApiError> {
    state
        .registry()
        .snapshot(&mission_id)
        .await
        .map(Json)
        .map_err(sim_error)
}

pub async fn start_simulation(
    State(state): State<Arc<AppState>>,
    Path(mission_id): Path<String>,
    body: Option<Json<StartRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let pattern = match request.pattern.as_deref() {
        Some(raw) => Some(raw.parse::<FlightPattern>().map_err(|err| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
        })?),
        None => None,
    };

    let outcome = state
        .registry()
        .start(&mission_id, pattern)
        .map_err(sim_error)?;
    let status = match outcome {
        StartOutcome::Started { .. } => StatusCode::CREATED,
        StartOutcome::AlreadyRunning { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

pub async fn pause_simulation(
    State(state): State<Arc<AppState>>,
    Path(mission_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.registry().pause(&mission_id).await.map_err(sim_error)?;
    Ok(Json(json!({ "mission_id": mission_id, "status": "paused" })))
}

pub async fn resume_simulation(
    State(state): State<Arc<AppState>>,
    Path(mission_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.registry().resume(&mission_id).await.map_err(sim_error)?;
    Ok(Json(json!({ "mission_id": mission_id, "status": "resumed" })))
}

pub async fn stop_simulation(
    State(state): State<Arc<AppState>>,
    Path(mission_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.registry().stop(&mission_id).await.map_err(sim_error)?;
    Ok(Json(json!({ "mission_id": mission_id, "status": "stopped" })))
}

pub async fn set_speed(
    State(state): State<Arc<AppState>>,
    Path(mission_id): Path<String>,
    Json(request): Json<SpeedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let applied = state
        .registry()
        .set_speed(&mission_id, request.speed_mps)
        .await
        .map_err(sim_error)?;
    Ok(Json(json!({
        "mission_id": mission_id,
        "requested_speed_mps": request.speed_mps,
        "applied_speed_mps": applied,
    })))
}

pub async fn trigger_rth(
    State(state): State<Arc<AppState>>,
    Path(mission_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registry()
        .trigger_rth(&mission_id)
        .await
        .map_err(sim_error)?;
    Ok(Json(json!({ "mission_id": mission_id, "status": "returning_home" })))
}
