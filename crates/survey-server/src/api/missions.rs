//! Mission registration, outcomes and path preview.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use survey_core::{
    area_from_geojson_value, FlightPattern, MissionDescriptor, MissionOutcome, PathParams,
    SurveyArea, Waypoint,
};

use crate::api::{sim_error, ApiError};
use crate::repository::RepositoryError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    /// `[[lat, lon], ...]` or a GeoJSON Polygon/Feature/FeatureCollection
    pub area: Value,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub params: PathParams,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub pattern: FlightPattern,
    pub total_waypoints: usize,
    pub total_distance_m: f64,
    pub waypoints: Vec<Waypoint>,
}

fn bad_request(error: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": error.into() })))
}

/// Accept either the native `[[lat, lon], ...]` ring or GeoJSON.
fn parse_area(value: &Value) -> Result<SurveyArea, ApiError> {
    if value.is_object() {
        area_from_geojson_value(value.clone()).map_err(|err| bad_request(err.to_string()))
    } else {
        serde_json::from_value(value.clone())
            .map_err(|err| bad_request(format!("Invalid area: {err}")))
    }
}

fn area_to_value(area: &SurveyArea) -> Value {
    Value::Array(area.ring().iter().map(|p| json!([p.lat, p.lon])).collect())
}

pub async fn create_mission(
    State(state): State<Arc<AppState>>,
    Json(mut body): Json<Value>,
) -> Result<(StatusCode, Json<MissionDescriptor>), ApiError> {
    let Some(fields) = body.as_object_mut() else {
        return Err(bad_request("Mission body must be a JSON object"));
    };
    if fields.get("mission_id").map_or(true, Value::is_null) {
        fields.insert("mission_id".into(), json!(uuid::Uuid::new_v4().to_string()));
    }
    let area = fields
        .get("area")
        .ok_or_else(|| bad_request("Mission requires an area"))
        .and_then(parse_area)?;
    fields.insert("area".into(), area_to_value(&area));

    let descriptor: MissionDescriptor = serde_json::from_value(body)
        .map_err(|err| bad_request(format!("Invalid mission: {err}")))?;

    state
        .repository()
        .upsert_mission(descriptor.clone())
        .map_err(|err| match err {
            RepositoryError::Invalid(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": reason, "mission_id": descriptor.mission_id })),
            ),
            other => bad_request(other.to_string()),
        })?;

    tracing::info!(
        "Registered mission {} for drone {}",
        descriptor.mission_id,
        descriptor.drone_id
    );
    Ok((StatusCode::CREATED, Json(descriptor)))
}

pub async fn list_missions(State(state): State<Arc<AppState>>) -> Json<Vec<MissionDescriptor>> {
    Json(state.repository().list_missions())
}

pub async fn get_outcome(
    State(state): State<Arc<AppState>>,
    Path(mission_id): Path<String>,
) -> Result<Json<MissionOutcome>, ApiError> {
    state.repository().outcome(&mission_id).map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "No outcome recorded",
                "hint": "Outcomes are recorded once a simulation completes or aborts",
                "mission_id": mission_id,
            })),
        )
    })
}

pub async fn preview_path(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let pattern = match request.pattern.as_deref() {
        Some(raw) => raw
            .parse::<FlightPattern>()
            .map_err(|err| bad_request(err.to_string()))?,
        None => FlightPattern::default(),
    };
    let area = parse_area(&request.area)?;

    let path = state
        .registry()
        .preview(&area, pattern, &request.params)
        .map_err(sim_error)?;

    Ok(Json(PreviewResponse {
        pattern,
        total_waypoints: path.len(),
        total_distance_m: path.total_distance_m(),
        waypoints: path.waypoints,
    }))
}
