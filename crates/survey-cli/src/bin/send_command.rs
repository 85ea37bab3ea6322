//! Drive a running survey server from the command line.
//!
//! Usage:
//!   cargo run -p survey-cli --bin send_command -- register --demo DEMO-1
//!   cargo run -p survey-cli --bin send_command -- start DEMO-1 --pattern crosshatch
//!   cargo run -p survey-cli --bin send_command -- speed DEMO-1 6.5

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use survey_cli::input::load_mission;
use survey_cli::scenarios::demo_mission;
use survey_cli::SurveyClient;
use survey_core::FlightPattern;

/// Send commands to a survey server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a mission from a file, or the demo square under the given id
    Register {
        #[arg(long, conflicts_with = "demo")]
        file: Option<PathBuf>,
        #[arg(long)]
        demo: Option<String>,
        #[arg(long, default_value = "DRONE001")]
        drone: String,
        #[arg(long, default_value = "grid")]
        pattern: FlightPattern,
    },
    /// Start (or attach to) a mission's simulation
    Start {
        mission_id: String,
        #[arg(long)]
        pattern: Option<FlightPattern>,
    },
    Pause { mission_id: String },
    Resume { mission_id: String },
    /// Abort a running mission
    Stop { mission_id: String },
    /// Change cruise speed (m/s)
    Speed { mission_id: String, speed_mps: f64 },
    /// Return to home
    Rth { mission_id: String },
    Status { mission_id: String },
    List,
    /// Terminal outcome recorded for a mission
    Outcome { mission_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let client = SurveyClient::new(args.url);

    let response: Value = match args.command {
        Command::Register {
            file,
            demo,
            drone,
            pattern,
        } => {
            let descriptor = match (file, demo) {
                (Some(path), _) => load_mission(path)?,
                (None, Some(id)) => demo_mission(&id, &drone, pattern),
                (None, None) => bail!("register needs --file or --demo"),
            };
            tracing::info!("Registering mission {}", descriptor.mission_id);
            client.register_mission(&descriptor).await?
        }
        Command::Start {
            mission_id,
            pattern,
        } => client.start(&mission_id, pattern).await?,
        Command::Pause { mission_id } => client.pause(&mission_id).await?,
        Command::Resume { mission_id } => client.resume(&mission_id).await?,
        Command::Stop { mission_id } => client.stop(&mission_id).await?,
        Command::Speed {
            mission_id,
            speed_mps,
        } => client.set_speed(&mission_id, speed_mps).await?,
        Command::Rth { mission_id } => client.trigger_rth(&mission_id).await?,
        Command::Status { mission_id } => client.snapshot(&mission_id).await?,
        Command::List => client.list().await?,
        Command::Outcome { mission_id } => client.outcome(&mission_id).await?,
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
