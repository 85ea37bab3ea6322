//! Core data models for survey simulation.
//!
//! Every coordinate in this crate is held as `[lat, lon]` in degrees.
//! GeoJSON input (`[lon, lat]`) is converted once in [`crate::geojson_area`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::dynamics::DroneProfile;
use crate::path_generator::PathParams;
use crate::spatial::{haversine_distance, lat_to_meters, lon_to_meters};

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self.lat, self.lon, other.lat, other.lon)
    }

    fn approx_eq(&self, other: &GeoPoint) -> bool {
        (self.lat - other.lat).abs() < 1e-12 && (self.lon - other.lon).abs() < 1e-12
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(point: GeoPoint) -> Self {
        [point.lat, point.lon]
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Smallest box containing every point. `None` for an empty slice.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            min_lat: first.lat,
            min_lon: first.lon,
            max_lat: first.lat,
            max_lon: first.lon,
        };
        for p in &points[1..] {
            bbox.min_lat = bbox.min_lat.min(p.lat);
            bbox.max_lat = bbox.max_lat.max(p.lat);
            bbox.min_lon = bbox.min_lon.min(p.lon);
            bbox.max_lon = bbox.max_lon.max(p.lon);
        }
        Some(bbox)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// East/west extent in meters, measured at the box center latitude.
    pub fn width_m(&self) -> f64 {
        lon_to_meters(self.max_lon - self.min_lon, self.center().lat)
    }

    /// North/south extent in meters.
    pub fn height_m(&self) -> f64 {
        lat_to_meters(self.max_lat - self.min_lat, self.center().lat)
    }

    /// Containment test with a tolerance in degrees.
    pub fn contains(&self, lat: f64, lon: f64, eps_deg: f64) -> bool {
        lat >= self.min_lat - eps_deg
            && lat <= self.max_lat + eps_deg
            && lon >= self.min_lon - eps_deg
            && lon <= self.max_lon + eps_deg
    }
}

/// Closed polygon ring the drone must cover.
///
/// Serialized as `[[lat, lon], ...]` with the first vertex repeated last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct SurveyArea {
    ring: Vec<GeoPoint>,
}

impl From<Vec<[f64; 2]>> for SurveyArea {
    fn from(pairs: Vec<[f64; 2]>) -> Self {
        Self::new(pairs.into_iter().map(GeoPoint::from).collect())
    }
}

impl From<SurveyArea> for Vec<[f64; 2]> {
    fn from(area: SurveyArea) -> Self {
        area.ring.into_iter().map(<[f64; 2]>::from).collect()
    }
}

impl SurveyArea {
    /// Wrap a ring as given. Use [`SurveyArea::closed`] when the source
    /// may omit the closing vertex.
    pub fn new(ring: Vec<GeoPoint>) -> Self {
        Self { ring }
    }

    /// Build a ring, appending the first vertex if it is not already last.
    pub fn closed(mut points: Vec<GeoPoint>) -> Self {
        if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
            if points.len() > 1 && !first.approx_eq(&last) {
                points.push(first);
            }
        }
        Self { ring: points }
    }

    pub fn ring(&self) -> &[GeoPoint] {
        &self.ring
    }

    pub fn has_non_finite(&self) -> bool {
        self.ring.iter().any(|p| !p.is_finite())
    }

    /// Distinct polygon vertices in ring order, without the closing repeat.
    pub fn vertices(&self) -> Vec<GeoPoint> {
        let mut out: Vec<GeoPoint> = Vec::with_capacity(self.ring.len());
        for p in &self.ring {
            if out.last().map_or(true, |last| !last.approx_eq(p)) {
                out.push(*p);
            }
        }
        while out.len() > 1 && out[0].approx_eq(&out[out.len() - 1]) {
            out.pop();
        }
        out
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.vertices())
    }

    /// Area-weighted centroid; falls back to the vertex mean for
    /// degenerate (zero-area) rings.
    ///
    /// Vertices are taken relative to the first one so the cross products
    /// stay small for areas a few meters across.
    pub fn centroid(&self) -> Option<GeoPoint> {
        let verts = self.vertices();
        let origin = *verts.first()?;
        let n = verts.len();
        let rel: Vec<(f64, f64)> = verts
            .iter()
            .map(|p| (p.lat - origin.lat, p.lon - origin.lon))
            .collect();

        let mut twice_area = 0.0;
        let mut c_lat = 0.0;
        let mut c_lon = 0.0;
        for i in 0..n {
            let (a_lat, a_lon) = rel[i];
            let (b_lat, b_lon) = rel[(i + 1) % n];
            let cross = a_lon * b_lat - b_lon * a_lat;
            twice_area += cross;
            c_lon += (a_lon + b_lon) * cross;
            c_lat += (a_lat + b_lat) * cross;
        }
        if twice_area.abs() < 1e-18 {
            let lat = rel.iter().map(|p| p.0).sum::<f64>() / n as f64;
            let lon = rel.iter().map(|p| p.1).sum::<f64>() / n as f64;
            return Some(GeoPoint::new(origin.lat + lat, origin.lon + lon));
        }
        Some(GeoPoint::new(
            origin.lat + c_lat / (3.0 * twice_area),
            origin.lon + c_lon / (3.0 * twice_area),
        ))
    }

    /// Validate the ring.
    /// Returns list of validation errors (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.has_non_finite() {
            errors.push("Polygon contains non-finite coordinates".to_string());
            return errors;
        }

        if self.ring.len() < 4 {
            errors.push(format!(
                "Polygon ring must have at least 4 points (got {})",
                self.ring.len()
            ));
        }

        if let (Some(first), Some(last)) = (self.ring.first(), self.ring.last()) {
            if (first.lat - last.lat).abs() > 1e-9 || (first.lon - last.lon).abs() > 1e-9 {
                errors.push("Polygon must be closed (first vertex must equal last)".to_string());
            }
        }

        let distinct = self.vertices().len();
        if distinct < 3 {
            errors.push(format!(
                "Polygon must have at least 3 distinct vertices (got {distinct})"
            ));
        }

        if self
            .ring
            .iter()
            .any(|p| p.lat.abs() > 90.0 || p.lon.abs() > 180.0)
        {
            errors.push("Polygon coordinates out of range (lat ±90, lon ±180)".to_string());
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Coverage strategy used to synthesize a flight path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightPattern {
    /// Lawn-mower sweep along lines of latitude
    #[default]
    Grid,
    /// Grid followed by an orthogonal sweep
    Crosshatch,
    /// Ring walk, optionally spiraling inward
    Perimeter,
    /// Diagonal parallel lines
    Hatch,
    /// Polygon vertices only
    Waypoint,
}

impl FlightPattern {
    pub const ALL: [FlightPattern; 5] = [
        FlightPattern::Grid,
        FlightPattern::Crosshatch,
        FlightPattern::Perimeter,
        FlightPattern::Hatch,
        FlightPattern::Waypoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlightPattern::Grid => "grid",
            FlightPattern::Crosshatch => "crosshatch",
            FlightPattern::Perimeter => "perimeter",
            FlightPattern::Hatch => "hatch",
            FlightPattern::Waypoint => "waypoint",
        }
    }
}

impl fmt::Display for FlightPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown flight pattern '{0}' (expected grid, crosshatch, perimeter, hatch or waypoint)")]
pub struct ParsePatternError(pub String);

impl FromStr for FlightPattern {
    type Err = ParsePatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        FlightPattern::ALL
            .into_iter()
            .find(|p| p.as_str() == lowered)
            .ok_or_else(|| ParsePatternError(s.to_string()))
    }
}

/// One ordered target point in a flight path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub index: usize,
    pub lat: f64,
    pub lon: f64,
    pub altitude_m: f64,
}

impl Waypoint {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && self.altitude_m.is_finite()
    }
}

/// Ordered waypoint sequence generated for one mission run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPath {
    pub pattern: FlightPattern,
    pub waypoints: Vec<Waypoint>,
}

impl FlightPath {
    pub fn empty(pattern: FlightPattern) -> Self {
        Self {
            pattern,
            waypoints: Vec::new(),
        }
    }

    /// Build from raw `[lat, lon]` points, assigning sequence indices.
    pub fn from_points(pattern: FlightPattern, points: &[GeoPoint], altitude_m: f64) -> Self {
        let waypoints = points
            .iter()
            .enumerate()
            .map(|(index, p)| Waypoint {
                index,
                lat: p.lat,
                lon: p.lon,
                altitude_m,
            })
            .collect();
        Self { pattern, waypoints }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    /// Sum of leg lengths from waypoint `from` to the end of the path.
    pub fn distance_from(&self, from: usize) -> f64 {
        if from >= self.waypoints.len() {
            return 0.0;
        }
        self.waypoints[from..]
            .windows(2)
            .map(|leg| haversine_distance(leg[0].lat, leg[0].lon, leg[1].lat, leg[1].lon))
            .sum()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.distance_from(0)
    }
}

fn default_cruise_speed() -> f64 {
    10.0
}

fn default_altitude() -> f64 {
    60.0
}

fn full_battery() -> f64 {
    100.0
}

/// Mission descriptor supplied by the mission repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionDescriptor {
    pub mission_id: String,
    pub drone_id: String,
    pub area: SurveyArea,
    #[serde(default)]
    pub pattern: FlightPattern,
    #[serde(default = "default_cruise_speed")]
    pub cruise_speed_mps: f64,
    #[serde(default = "default_altitude")]
    pub altitude_m: f64,
    /// Launch/landing point. Defaults to the first waypoint.
    #[serde(default)]
    pub home: Option<GeoPoint>,
    #[serde(default)]
    pub path: PathParams,
    #[serde(default)]
    pub drone: DroneProfile,
    #[serde(default = "full_battery")]
    pub initial_battery_pct: f64,
}

impl MissionDescriptor {
    /// Path parameters with the mission altitude applied.
    pub fn path_params(&self) -> PathParams {
        PathParams {
            altitude_m: self.altitude_m,
            ..self.path.clone()
        }
    }

    /// Validate descriptor fields that the path generator does not check.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.area.validate();
        if self.drone_id.trim().is_empty() {
            errors.push("Mission has no drone assigned".to_string());
        }
        if !self.cruise_speed_mps.is_finite() || self.cruise_speed_mps <= 0.0 {
            errors.push(format!(
                "Cruise speed must be positive (got {})",
                self.cruise_speed_mps
            ));
        }
        if !self.altitude_m.is_finite() || self.altitude_m <= 0.0 {
            errors.push(format!("Altitude must be positive (got {})", self.altitude_m));
        }
        if let Some(home) = self.home {
            if !home.is_finite() {
                errors.push("Home position contains non-finite coordinates".to_string());
            }
        }
        if !(0.0..=100.0).contains(&self.initial_battery_pct) {
            errors.push(format!(
                "Initial battery must be within 0-100% (got {})",
                self.initial_battery_pct
            ));
        }
        errors.extend(self.drone.validate());
        errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Completed,
    Aborted,
}

/// Terminal result recorded back into the mission repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionOutcome {
    pub mission_id: String,
    pub drone_id: String,
    pub status: OutcomeStatus,
    pub waypoints_visited: usize,
    pub total_waypoints: usize,
    pub flight_time_s: f64,
    pub battery_used_pct: f64,
    #[serde(default)]
    pub reason: Option<String>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> SurveyArea {
        SurveyArea::from(vec![
            [33.0, -117.0],
            [33.0, -116.99],
            [33.01, -116.99],
            [33.01, -117.0],
            [33.0, -117.0],
        ])
    }

    #[test]
    fn vertices_drop_closing_and_repeated_points() {
        let area = SurveyArea::from(vec![
            [33.0, -117.0],
            [33.0, -117.0],
            [33.0, -116.99],
            [33.01, -116.99],
            [33.0, -117.0],
        ]);
        assert_eq!(area.vertices().len(), 3);
    }

    #[test]
    fn closed_appends_missing_closing_vertex() {
        let area = SurveyArea::closed(vec![
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, 2.0),
            GeoPoint::new(2.0, 2.0),
        ]);
        assert_eq!(area.ring().len(), 4);
        assert!(area.is_valid());
    }

    #[test]
    fn validate_reports_open_and_degenerate_rings() {
        let open = SurveyArea::from(vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.5]]);
        assert!(open.validate().iter().any(|e| e.contains("closed")));

        let line = SurveyArea::from(vec![[0.0, 0.0], [0.0, 1.0], [0.0, 0.0], [0.0, 0.0]]);
        assert!(line.validate().iter().any(|e| e.contains("distinct")));
    }

    #[test]
    fn centroid_of_square_is_its_center() {
        let c = square().centroid().unwrap();
        assert!((c.lat - 33.005).abs() < 1e-9);
        assert!((c.lon + 116.995).abs() < 1e-9);
    }

    #[test]
    fn centroid_of_small_square_stays_centered() {
        // Roughly 10 m on a side.
        let area = SurveyArea::from(vec![
            [33.68, -117.83],
            [33.68, -117.8299],
            [33.6801, -117.8299],
            [33.6801, -117.83],
            [33.68, -117.83],
        ]);
        let c = area.centroid().unwrap();
        assert!((c.lat - 33.68005).abs() < 1e-9);
        assert!((c.lon + 117.82995).abs() < 1e-9);
    }

    #[test]
    fn area_serializes_as_lat_lon_pairs() {
        let json = serde_json::to_value(square()).unwrap();
        assert_eq!(json[1][0].as_f64(), Some(33.0));
        assert_eq!(json[1][1].as_f64(), Some(-116.99));
        let back: SurveyArea = serde_json::from_value(json).unwrap();
        assert_eq!(back, square());
    }

    #[test]
    fn pattern_parses_case_insensitively() {
        assert_eq!("CrossHatch".parse::<FlightPattern>(), Ok(FlightPattern::Crosshatch));
        assert!("spiral".parse::<FlightPattern>().is_err());
    }

    #[test]
    fn descriptor_defaults_fill_optional_fields() {
        let descriptor: MissionDescriptor = serde_json::from_value(serde_json::json!({
            "mission_id": "M1",
            "drone_id": "D1",
            "area": [[33.0, -117.0], [33.0, -116.99], [33.01, -116.99], [33.0, -117.0]]
        }))
        .unwrap();
        assert_eq!(descriptor.pattern, FlightPattern::Grid);
        assert_eq!(descriptor.initial_battery_pct, 100.0);
        assert!(descriptor.validate().is_empty());
        assert_eq!(descriptor.path_params().altitude_m, descriptor.altitude_m);
    }
}
