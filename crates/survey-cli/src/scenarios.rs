//! Pre-defined survey areas and missions for demos and testing.

use survey_core::spatial::{offset_by_bearing, offset_position};
use survey_core::{FlightPattern, GeoPoint, MissionDescriptor, SurveyArea};

/// UCI campus, used as the default demo site.
pub const DEMO_LAT: f64 = 33.6846;
pub const DEMO_LON: f64 = -117.8265;

/// Axis-aligned square of `side_m` meters centered on a point.
pub fn square_area(center_lat: f64, center_lon: f64, side_m: f64) -> SurveyArea {
    let half = side_m / 2.0;
    let corners = [(-half, -half), (-half, half), (half, half), (half, -half)];
    let points = corners
        .iter()
        .map(|&(north, east)| {
            let (lat, lon) = offset_position(center_lat, center_lon, north, east);
            GeoPoint::new(lat, lon)
        })
        .collect();
    SurveyArea::closed(points)
}

/// Regular hexagon with the given circumradius.
pub fn hexagon_area(center_lat: f64, center_lon: f64, radius_m: f64) -> SurveyArea {
    let points = (0..6)
        .map(|i| {
            let bearing = (i as f64 * 60.0).to_radians();
            let (lat, lon) = offset_by_bearing(center_lat, center_lon, radius_m, bearing);
            GeoPoint::new(lat, lon)
        })
        .collect();
    SurveyArea::closed(points)
}

/// A ready-to-run mission over a 200 m square at the demo site.
pub fn demo_mission(mission_id: &str, drone_id: &str, pattern: FlightPattern) -> MissionDescriptor {
    let area = square_area(DEMO_LAT, DEMO_LON, 200.0);
    MissionDescriptor {
        mission_id: mission_id.to_string(),
        drone_id: drone_id.to_string(),
        home: area.bounding_box().map(|b| GeoPoint::new(b.min_lat, b.min_lon)),
        area,
        pattern,
        cruise_speed_mps: 10.0,
        altitude_m: 60.0,
        path: Default::default(),
        drone: Default::default(),
        initial_battery_pct: 100.0,
    }
}
