//! Tick loop for one running mission.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use survey_core::{LifecycleState, MissionSim, SimEvent, SimResult, SimSnapshot};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

use crate::publisher::TelemetryPublisher;
use crate::repository::MissionRepository;
use crate::sim::registry::MissionHandle;

/// Commands delivered to a mission task, each with its acknowledgement.
#[derive(Debug)]
pub(crate) enum SimCommand {
    Pause(oneshot::Sender<SimResult<()>>),
    Resume(oneshot::Sender<SimResult<()>>),
    Stop {
        reason: String,
        ack: oneshot::Sender<SimResult<()>>,
    },
    SetSpeed {
        speed_mps: f64,
        ack: oneshot::Sender<SimResult<f64>>,
    },
    TriggerRth(oneshot::Sender<SimResult<()>>),
    Snapshot(oneshot::Sender<SimSnapshot>),
}

impl SimCommand {
    fn name(&self) -> &'static str {
        match self {
            SimCommand::Pause(_) => "pause",
            SimCommand::Resume(_) => "resume",
            SimCommand::Stop { .. } => "stop",
            SimCommand::SetSpeed { .. } => "speed",
            SimCommand::TriggerRth(_) => "rth",
            SimCommand::Snapshot(_) => "snapshot",
        }
    }
}

pub(crate) struct TaskContext {
    pub run_id: String,
    pub tick_period: Duration,
    pub handles: Arc<DashMap<String, MissionHandle>>,
    pub publisher: Arc<dyn TelemetryPublisher>,
    pub repository: Arc<dyn MissionRepository>,
}

pub(crate) async fn run_mission(
    mut sim: MissionSim,
    mut commands: mpsc::Receiver<SimCommand>,
    ctx: TaskContext,
) {
    let mut ticker = interval(ctx.tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick of an interval completes immediately
    ticker.reset();

    loop {
        let paused = sim.lifecycle() == LifecycleState::Paused;

        tokio::select! {
            biased;
            command = commands.recv() => {
                let Some(command) = command else {
                    publish(&ctx, sim.abort("controller dropped"));
                    break;
                };
                apply_command(&mut sim, command, &ctx);
                if paused && sim.lifecycle() != LifecycleState::Paused {
                    ticker.reset();
                }
            }
            _ = ticker.tick(), if !paused => {
                publish(&ctx, sim.tick());
            }
        }

        if sim.is_finished() {
            break;
        }
    }

    finish(&sim, &ctx);
}

fn apply_command(sim: &mut MissionSim, command: SimCommand, ctx: &TaskContext) {
    let command_name = command.name();
    let delivered = match command {
        SimCommand::Pause(ack) => ack.send(sim.pause().map(|events| publish(ctx, events))).is_ok(),
        SimCommand::Resume(ack) => ack.send(sim.resume().map(|events| publish(ctx, events))).is_ok(),
        SimCommand::Stop { reason, ack } => {
            publish(ctx, sim.abort(&reason));
            ack.send(Ok(())).is_ok()
        }
        SimCommand::SetSpeed { speed_mps, ack } => ack.send(sim.set_speed(speed_mps)).is_ok(),
        SimCommand::TriggerRth(ack) => {
            ack.send(sim.trigger_rth().map(|events| publish(ctx, events))).is_ok()
        }
        SimCommand::Snapshot(ack) => ack.send(sim.snapshot()).is_ok(),
    };
    if !delivered {
        tracing::debug!(
            mission_id = %sim.mission_id(),
            command = command_name,
            "Command applied but caller went away before the reply"
        );
    }
}

fn publish(ctx: &TaskContext, events: Vec<SimEvent>) {
    for event in events {
        ctx.publisher.publish(event);
    }
}

/// Record the outcome and drop this run's handle. A newer run under the
/// same mission id keeps its handle.
fn finish(sim: &MissionSim, ctx: &TaskContext) {
    if let Some(outcome) = sim.outcome() {
        if let Err(err) = ctx.repository.record_outcome(outcome.clone()) {
            tracing::error!("Failed to record outcome for {}: {}", sim.mission_id(), err);
        }
    }

    let removed = ctx
        .handles
        .remove_if(sim.mission_id(), |_, handle| handle.run_id == ctx.run_id)
        .is_some();
    tracing::info!(
        "Mission {} run {} finished in {} (handle removed: {})",
        sim.mission_id(),
        ctx.run_id,
        sim.lifecycle(),
        removed
    );
}
