//! Run a survey mission locally, without the server, as fast as the CPU allows.
//!
//! Usage:
//!   cargo run -p survey-cli --bin run_headless -- --pattern crosshatch --events

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use survey_cli::input::load_mission;
use survey_cli::scenarios::demo_mission;
use survey_core::{FlightPattern, LifecycleState, MissionSim, SimEvent, SimRules};
use tracing_subscriber::EnvFilter;

/// Headless survey simulation
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Mission JSON file. Defaults to the demo square.
    #[arg(long)]
    mission: Option<PathBuf>,

    /// Override the mission's flight pattern
    #[arg(long)]
    pattern: Option<FlightPattern>,

    /// Simulated seconds per wall-clock second (scales each tick's dt)
    #[arg(long, default_value_t = 1.0)]
    time_scale: f64,

    /// Give up after this many ticks
    #[arg(long, default_value_t = 2_000_000)]
    max_ticks: u64,

    /// Print every event as a JSON line on stdout
    #[arg(long)]
    events: bool,

    /// Abort the mission at this tick (exercises the abort path)
    #[arg(long)]
    abort_at: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("survey_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let descriptor = match &args.mission {
        Some(path) => load_mission(path)?,
        None => demo_mission("HEADLESS-1", "DRONE001", FlightPattern::Grid),
    };
    let rules = SimRules {
        time_scale: args.time_scale,
        ..SimRules::default()
    };
    let mut sim = MissionSim::from_descriptor(&descriptor, args.pattern, rules)?;
    tracing::info!(
        mission_id = %sim.mission_id(),
        waypoints = sim.path().len(),
        distance_m = sim.path().total_distance_m(),
        "Starting headless run"
    );

    let mut state_changes = 0usize;
    let mut last_state = sim.lifecycle();
    emit(&args, sim.start()?)?;

    let mut ticks = 0u64;
    while !sim.is_finished() {
        if ticks >= args.max_ticks {
            bail!(
                "mission still {} after {} ticks ({:.1}% covered)",
                sim.lifecycle(),
                ticks,
                sim.progress_pct()
            );
        }
        let events = if args.abort_at == Some(ticks) {
            sim.abort("aborted from command line")
        } else {
            sim.tick()
        };
        ticks += 1;

        if sim.lifecycle() != last_state {
            tracing::debug!(from = %last_state, to = %sim.lifecycle(), tick = ticks, "State change");
            last_state = sim.lifecycle();
            state_changes += 1;
        }
        emit(&args, events)?;
    }

    let Some(outcome) = sim.outcome() else {
        bail!("mission finished without an outcome");
    };
    eprintln!(
        "{} {:?}: {}/{} waypoints, {:.0} s flight time, {:.1}% battery used, {} state changes, {} ticks",
        outcome.mission_id,
        outcome.status,
        outcome.waypoints_visited,
        outcome.total_waypoints,
        outcome.flight_time_s,
        outcome.battery_used_pct,
        state_changes,
        ticks
    );
    if let Some(reason) = &outcome.reason {
        eprintln!("reason: {reason}");
    }
    if !args.events {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    }
    if sim.lifecycle() != LifecycleState::Completed {
        std::process::exit(1);
    }
    Ok(())
}

fn emit(args: &Args, events: Vec<SimEvent>) -> Result<()> {
    if args.events {
        for event in events {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}
