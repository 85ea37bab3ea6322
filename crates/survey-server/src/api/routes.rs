//! REST API routes.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::{missions, simulations, ws};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        // Simulation control
        .route("/v1/simulations", get(simulations::list_simulations))
        .route("/v1/simulations/:mission_id", get(simulations::get_simulation))
        .route("/v1/simulations/:mission_id/start", post(simulations::start_simulation))
        .route("/v1/simulations/:mission_id/pause", post(simulations::pause_simulation))
        .route("/v1/simulations/:mission_id/resume", post(simulations::resume_simulation))
        .route("/v1/simulations/:mission_id/stop", post(simulations::stop_simulation))
        .route("/v1/simulations/:mission_id/speed", post(simulations::set_speed))
        .route("/v1/simulations/:mission_id/rth", post(simulations::trigger_rth))
        // Mission descriptors and outcomes
        .route("/v1/missions", post(missions::create_mission).get(missions::list_missions))
        .route("/v1/missions/:mission_id/outcome", get(missions::get_outcome))
        .route("/v1/paths/preview", post(missions::preview_path))
        // WebSocket streaming
        .route("/v1/stream", get(ws::ws_handler))
}
