use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::{api, config::Config, state::AppState};

fn setup_app() -> (axum::Router, Arc<AppState>) {
    let mut config = Config::default();
    config.rules.time_scale = 20.0;
    let state = Arc::new(AppState::new(config));
    let app = api::routes().with_state(state.clone());
    (app, state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn square_ring() -> Value {
    json!([
        [33.0, -117.0],
        [33.0, -116.999],
        [33.0009, -116.999],
        [33.0009, -117.0],
        [33.0, -117.0]
    ])
}

async fn register_mission(app: &axum::Router, mission_id: &str) {
    let res = app
        .clone()
        .oneshot(post(
            "/v1/missions",
            json!({
                "mission_id": mission_id,
                "drone_id": "DRONE_TEST",
                "area": square_ring(),
                "pattern": "grid",
                "altitude_m": 40.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn health_check() {
    let (app, _state) = setup_app();
    let res = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_mission_from_geojson() {
    let (app, state) = setup_app();

    let res = app
        .clone()
        .oneshot(post(
            "/v1/missions",
            json!({
                "drone_id": "DRONE_GEO",
                "area": {
                    "type": "Polygon",
                    "coordinates": [[[-117.0, 33.0], [-116.999, 33.0], [-116.999, 33.001], [-117.0, 33.0]]]
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = read_json(res).await;
    let mission_id = body["mission_id"].as_str().expect("generated mission id");
    assert_eq!(body["area"][1], json!([33.0, -116.999]));
    assert_eq!(body["pattern"], "grid");
    assert!(state.repository().outcome(mission_id).is_none());
    assert_eq!(state.repository().list_missions().len(), 1);
}

#[tokio::test]
async fn register_mission_rejects_degenerate_polygon() {
    let (app, _state) = setup_app();
    let res = app
        .oneshot(post(
            "/v1/missions",
            json!({
                "mission_id": "BAD",
                "drone_id": "DRONE_TEST",
                "area": [[33.0, -117.0], [33.0, -116.999], [33.0, -117.0]]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn start_is_idempotent_and_stop_tears_down() {
    let (app, state) = setup_app();
    register_mission(&app, "M-START").await;

    let first = app
        .clone()
        .oneshot(post("/v1/simulations/M-START/start", json!({})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_body = read_json(first).await;
    assert_eq!(first_body["outcome"], "started");

    let second = app
        .clone()
        .oneshot(post("/v1/simulations/M-START/start", json!({ "pattern": "hatch" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = read_json(second).await;
    assert_eq!(second_body["outcome"], "already_running");
    assert_eq!(second_body["run_id"], first_body["run_id"]);

    let list = read_json(app.clone().oneshot(get("/v1/simulations")).await.unwrap()).await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let snapshot = app
        .clone()
        .oneshot(get("/v1/simulations/M-START"))
        .await
        .unwrap();
    assert_eq!(snapshot.status(), StatusCode::OK);
    let snapshot = read_json(snapshot).await;
    assert_eq!(snapshot["pattern"], "grid");

    let stop = app
        .clone()
        .oneshot(post("/v1/simulations/M-START/stop", json!({})))
        .await
        .unwrap();
    assert_eq!(stop.status(), StatusCode::OK);

    for _ in 0..100 {
        if !state.registry().is_running("M-START") {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(!state.registry().is_running("M-START"));

    let outcome = app
        .clone()
        .oneshot(get("/v1/missions/M-START/outcome"))
        .await
        .unwrap();
    assert_eq!(outcome.status(), StatusCode::OK);
    assert_eq!(read_json(outcome).await["status"], "aborted");
}

#[tokio::test]
async fn pause_resume_and_speed_commands() {
    let (app, state) = setup_app();
    register_mission(&app, "M-CMD").await;
    state.registry().start("M-CMD", None).unwrap();

    let pause = app
        .clone()
        .oneshot(post("/v1/simulations/M-CMD/pause", json!({})))
        .await
        .unwrap();
    assert_eq!(pause.status(), StatusCode::OK);

    let again = app
        .clone()
        .oneshot(post("/v1/simulations/M-CMD/pause", json!({})))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let snapshot = read_json(app.clone().oneshot(get("/v1/simulations/M-CMD")).await.unwrap()).await;
    assert_eq!(snapshot["dynamics"]["state"], "PAUSED");
    assert!(snapshot["paused_from"].is_string());

    let resume = app
        .clone()
        .oneshot(post("/v1/simulations/M-CMD/resume", json!({})))
        .await
        .unwrap();
    assert_eq!(resume.status(), StatusCode::OK);

    let speed = app
        .clone()
        .oneshot(post("/v1/simulations/M-CMD/speed", json!({ "speed_mps": 40.0 })))
        .await
        .unwrap();
    assert_eq!(speed.status(), StatusCode::OK);
    assert_eq!(read_json(speed).await["applied_speed_mps"], 15.0);

    let rth = app
        .clone()
        .oneshot(post("/v1/simulations/M-CMD/rth", json!({})))
        .await
        .unwrap();
    assert_eq!(rth.status(), StatusCode::OK);

    state.registry().shutdown().await;
}

#[tokio::test]
async fn commands_for_unknown_mission_are_not_found() {
    let (app, _state) = setup_app();
    for action in ["pause", "resume", "stop", "rth"] {
        let res = app
            .clone()
            .oneshot(post(&format!("/v1/simulations/NOPE/{action}"), json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{action}");
    }
    let res = app.oneshot(get("/v1/missions/NOPE/outcome")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_unregistered_mission_is_unprocessable() {
    let (app, _state) = setup_app();
    let res = app
        .oneshot(post("/v1/simulations/GHOST/start", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn start_with_unknown_pattern_is_bad_request() {
    let (app, _state) = setup_app();
    register_mission(&app, "M-PAT").await;
    let res = app
        .oneshot(post("/v1/simulations/M-PAT/start", json!({ "pattern": "spiral" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preview_path_returns_waypoints() {
    let (app, state) = setup_app();
    let res = app
        .oneshot(post(
            "/v1/paths/preview",
            json!({
                "area": square_ring(),
                "pattern": "Perimeter",
                "params": { "perimeter_laps": 2 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = read_json(res).await;
    assert_eq!(body["pattern"], "perimeter");
    assert_eq!(body["total_waypoints"], 10);
    assert!(body["total_distance_m"].as_f64().unwrap() > 0.0);
    assert!(state.registry().active().is_empty());
}

#[tokio::test]
async fn preview_rejects_invalid_area() {
    let (app, _state) = setup_app();
    let res = app
        .oneshot(post(
            "/v1/paths/preview",
            json!({ "area": [[33.0, -117.0], [f64::MAX, -117.0]] }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
