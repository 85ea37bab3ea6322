//! Registry integration tests.
//!
//! Run on tokio's paused clock, so whole missions finish in virtual time.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use survey_core::{
    LifecycleState, MissionDescriptor, MissionStatus, OutcomeStatus, SimError, SimEvent, SimRules,
};
use survey_server::publisher::{BroadcastPublisher, EventEnvelope};
use survey_server::repository::InMemoryMissionRepository;
use survey_server::sim::{SimulationRegistry, StartOutcome};
use tokio::sync::broadcast;

struct Harness {
    repository: Arc<InMemoryMissionRepository>,
    publisher: Arc<BroadcastPublisher>,
    registry: SimulationRegistry,
}

fn harness() -> Harness {
    let repository = Arc::new(InMemoryMissionRepository::new());
    let publisher = Arc::new(BroadcastPublisher::new(65_536));
    let rules = SimRules {
        time_scale: 20.0,
        ..SimRules::default()
    };
    let registry = SimulationRegistry::new(
        repository.clone(),
        publisher.clone(),
        rules,
        Duration::from_millis(50),
    );
    Harness {
        repository,
        publisher,
        registry,
    }
}

fn descriptor(mission_id: &str, drone_id: &str) -> MissionDescriptor {
    serde_json::from_value(json!({
        "mission_id": mission_id,
        "drone_id": drone_id,
        "area": [
            [33.0, -117.0],
            [33.0, -116.999],
            [33.0009, -116.999],
            [33.0009, -117.0],
            [33.0, -117.0]
        ],
        "altitude_m": 30.0
    }))
    .unwrap()
}

fn register(h: &Harness, mission_id: &str) {
    h.repository
        .upsert_mission(descriptor(mission_id, &format!("{mission_id}-drone")))
        .unwrap();
}

/// Collect events for `mission_id` until its terminal status arrives.
async fn events_until_terminal(
    rx: &mut broadcast::Receiver<EventEnvelope>,
    mission_id: &str,
) -> Vec<SimEvent> {
    let mut events = Vec::new();
    loop {
        let envelope = tokio::time::timeout(Duration::from_secs(3_600), rx.recv())
            .await
            .expect("mission did not finish")
            .expect("event stream closed");
        if envelope.mission_id() != mission_id {
            continue;
        }
        let event = (*envelope.event).clone();
        let terminal = matches!(
            &event,
            SimEvent::MissionStatus(s) if s.status != MissionStatus::Started
        );
        events.push(event);
        if terminal {
            return events;
        }
    }
}

async fn wait_until_removed(registry: &SimulationRegistry, mission_id: &str) {
    for _ in 0..1_000 {
        if !registry.is_running(mission_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("handle for {mission_id} was never removed");
}

#[tokio::test(start_paused = true)]
async fn mission_runs_to_completion_and_records_outcome() {
    let h = harness();
    register(&h, "M-1");
    let mut rx = h.publisher.subscribe();

    let outcome = h.registry.start("M-1", None).unwrap();
    assert!(matches!(outcome, StartOutcome::Started { .. }));

    let events = events_until_terminal(&mut rx, "M-1").await;

    let progress: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            SimEvent::MissionProgress(p) => Some(p.percentage),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[1] >= w[0]));
    assert_eq!(progress.last().copied(), Some(100.0));

    let states: Vec<LifecycleState> = events
        .iter()
        .filter_map(|e| match e {
            SimEvent::Telemetry(t) => Some(t.state),
            _ => None,
        })
        .collect();
    assert!(states.contains(&LifecycleState::Flying));
    assert!(states.contains(&LifecycleState::Charging));
    assert_eq!(states.last(), Some(&LifecycleState::Completed));

    match events.last() {
        Some(SimEvent::MissionStatus(s)) => assert_eq!(s.status, MissionStatus::Completed),
        other => panic!("expected completion, got {other:?}"),
    }

    wait_until_removed(&h.registry, "M-1").await;
    let recorded = h.repository.outcome("M-1").unwrap();
    assert_eq!(recorded.status, OutcomeStatus::Completed);
    assert_eq!(recorded.waypoints_visited, recorded.total_waypoints);
}

#[tokio::test(start_paused = true)]
async fn double_start_keeps_a_single_handle() {
    let h = harness();
    register(&h, "M-2");
    let mut rx = h.publisher.subscribe();

    let first = h.registry.start("M-2", None).unwrap();
    let second = h.registry.start("M-2", None).unwrap();
    let run_id = match first {
        StartOutcome::Started { run_id, .. } => run_id,
        other => panic!("expected a fresh start, got {other:?}"),
    };
    assert_eq!(second, StartOutcome::AlreadyRunning { run_id });
    assert_eq!(h.registry.active().len(), 1);

    h.registry.stop("M-2").await.unwrap();
    let events = events_until_terminal(&mut rx, "M-2").await;
    let started = events
        .iter()
        .filter(|e| matches!(e, SimEvent::MissionStatus(s) if s.status == MissionStatus::Started))
        .count();
    assert_eq!(started, 1);

    wait_until_removed(&h.registry, "M-2").await;
    assert!(h.registry.active().is_empty());
    assert_eq!(h.repository.outcome("M-2").unwrap().status, OutcomeStatus::Aborted);
}

#[tokio::test(start_paused = true)]
async fn restart_after_stop_gets_a_new_run() {
    let h = harness();
    register(&h, "M-3");

    let first = h.registry.start("M-3", None).unwrap();
    h.registry.stop("M-3").await.unwrap();
    wait_until_removed(&h.registry, "M-3").await;

    let second = h.registry.start("M-3", None).unwrap();
    assert!(matches!(second, StartOutcome::Started { .. }));
    assert_ne!(first, second);

    // The stale run must not have removed the new handle
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(h.registry.is_running("M-3"));
    h.registry.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn paused_mission_does_not_block_others() {
    let h = harness();
    register(&h, "M-A");
    register(&h, "M-B");
    let mut rx = h.publisher.subscribe();

    h.registry.start("M-A", None).unwrap();
    h.registry.start("M-B", None).unwrap();
    h.registry.pause("M-A").await.unwrap();
    let frozen = h.registry.snapshot("M-A").await.unwrap();

    let events = events_until_terminal(&mut rx, "M-B").await;
    assert!(matches!(
        events.last(),
        Some(SimEvent::MissionStatus(s)) if s.status == MissionStatus::Completed
    ));

    let still = h.registry.snapshot("M-A").await.unwrap();
    assert_eq!(still.dynamics, frozen.dynamics);
    assert_eq!(still.cursor, frozen.cursor);

    h.registry.resume("M-A").await.unwrap();
    let mut rx = h.publisher.subscribe();
    let events = events_until_terminal(&mut rx, "M-A").await;
    assert!(matches!(
        events.last(),
        Some(SimEvent::MissionStatus(s)) if s.status == MissionStatus::Completed
    ));
}

#[tokio::test(start_paused = true)]
async fn stop_while_paused_aborts() {
    let h = harness();
    register(&h, "M-4");
    let mut rx = h.publisher.subscribe();

    h.registry.start("M-4", None).unwrap();
    h.registry.pause("M-4").await.unwrap();
    h.registry.stop("M-4").await.unwrap();

    let events = events_until_terminal(&mut rx, "M-4").await;
    match events.last() {
        Some(SimEvent::MissionStatus(s)) => {
            assert_eq!(s.status, MissionStatus::Aborted);
            assert_eq!(s.reason.as_deref(), Some("stopped by operator"));
        }
        other => panic!("expected abort, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_missions_are_rejected() {
    let h = harness();
    assert!(matches!(
        h.registry.start("GHOST", None),
        Err(SimError::Configuration(_))
    ));
    assert_eq!(
        h.registry.pause("GHOST").await,
        Err(SimError::NotRunning("GHOST".to_string()))
    );
    assert!(matches!(
        h.registry.set_speed("GHOST", 5.0).await,
        Err(SimError::NotRunning(_))
    ));
    assert!(h.registry.active().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_every_mission() {
    let h = harness();
    register(&h, "M-5");
    register(&h, "M-6");
    h.registry.start("M-5", None).unwrap();
    h.registry.start("M-6", None).unwrap();

    assert_eq!(h.registry.shutdown().await, 2);
    wait_until_removed(&h.registry, "M-5").await;
    wait_until_removed(&h.registry, "M-6").await;
    assert_eq!(h.repository.outcome("M-5").unwrap().status, OutcomeStatus::Aborted);
}
