//! API routes for the survey simulation server.

pub mod missions;
mod routes;
pub mod simulations;
pub mod ws;

use std::sync::Arc;

use axum::{http::StatusCode, Json, Router};
use serde_json::{json, Value};
use survey_core::SimError;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    routes::create_router()
}

pub type ApiError = (StatusCode, Json<Value>);

/// Map a simulation error onto an HTTP status and JSON body.
pub fn sim_error(err: SimError) -> ApiError {
    let (status, hint) = match &err {
        SimError::Configuration(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Register the mission with a valid polygon via POST /v1/missions",
        ),
        SimError::EmptyPath { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Try a different pattern or a larger survey area",
        ),
        SimError::NotRunning(_) => (
            StatusCode::NOT_FOUND,
            "Start the simulation first via POST /v1/simulations/:mission_id/start",
        ),
        SimError::InvalidCommand(_) => (
            StatusCode::CONFLICT,
            "Check the mission state via GET /v1/simulations/:mission_id",
        ),
        SimError::InvalidTransition { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Lifecycle invariant violated; the mission was aborted",
        ),
    };
    (
        status,
        Json(json!({
            "error": err.to_string(),
            "hint": hint,
        })),
    )
}

#[cfg(test)]
mod tests;
