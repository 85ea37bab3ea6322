//! Generate a coverage path and print it without simulating.
//!
//! Usage:
//!   cargo run -p survey-cli --bin preview_path -- --area field.geojson --pattern hatch

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use survey_core::{generate, FlightPattern, PathParams};
use survey_cli::input::load_area;
use survey_cli::scenarios::{square_area, DEMO_LAT, DEMO_LON};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

/// Preview a survey flight path
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Polygon file: GeoJSON or a [[lat, lon], ...] array. Defaults to a demo square.
    #[arg(long)]
    area: Option<PathBuf>,

    /// Side of the demo square in meters (when --area is not given)
    #[arg(long, default_value_t = 200.0)]
    side: f64,

    /// grid, crosshatch, perimeter, hatch or waypoint
    #[arg(long, default_value = "grid")]
    pattern: FlightPattern,

    /// Base line spacing in meters
    #[arg(long, default_value_t = 40.0)]
    spacing: f64,

    /// Image overlap fraction (0-0.95)
    #[arg(long, default_value_t = 0.7)]
    overlap: f64,

    #[arg(long, default_value_t = 60.0)]
    altitude: f64,

    /// Round off grid row ends
    #[arg(long)]
    smooth: bool,

    /// Perimeter laps (inward spiral when > 1)
    #[arg(long, default_value_t = 1)]
    laps: u32,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let area = match &args.area {
        Some(path) => load_area(path)?,
        None => square_area(DEMO_LAT, DEMO_LON, args.side),
    };
    let params = PathParams {
        base_spacing_m: args.spacing,
        overlap: args.overlap,
        altitude_m: args.altitude,
        smooth_turns: args.smooth,
        perimeter_laps: args.laps,
        ..PathParams::default()
    };

    let path = generate(&area, args.pattern, &params);
    if path.is_empty() {
        bail!("{} pattern produced no waypoints for this area", args.pattern);
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&path)?),
        OutputFormat::Csv => {
            println!("index,lat,lon,altitude_m");
            for wp in &path.waypoints {
                println!("{},{:.7},{:.7},{:.1}", wp.index, wp.lat, wp.lon, wp.altitude_m);
            }
        }
    }
    eprintln!(
        "{} waypoints, {:.0} m total",
        path.len(),
        path.total_distance_m()
    );
    Ok(())
}
