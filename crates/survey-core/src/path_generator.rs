//! Coverage path synthesis.
//!
//! `generate` is a pure function of the survey area, pattern and
//! parameters. Invalid input yields an empty path rather than an error;
//! callers treat an empty path as "cannot simulate".

use serde::{Deserialize, Serialize};

use crate::models::{BoundingBox, FlightPath, FlightPattern, GeoPoint, SurveyArea};
use crate::spatial::{meters_to_lat, meters_to_lon, LocalFrame};

const DEFAULT_BASE_SPACING_M: f64 = 40.0;
const DEFAULT_OVERLAP: f64 = 0.7;
const DEFAULT_ALTITUDE_M: f64 = 60.0;
const DEFAULT_LAP_SHRINK: f64 = 0.15;
const DEFAULT_HATCH_ANGLE_DEG: f64 = 45.0;

const MAX_OVERLAP: f64 = 0.95;
const MIN_SPACING_M: f64 = 1.0;
/// Upper bound on sweep lines per pass.
const MAX_SCAN_LINES: usize = 2_000;
const MAX_PERIMETER_LAPS: u32 = 20;
/// Laps scaled below this fraction of the ring collapse onto the centroid.
const MIN_LAP_SCALE: f64 = 0.05;

/// Tunables for path synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathParams {
    /// Sensor footprint spacing before overlap is applied (meters)
    pub base_spacing_m: f64,
    /// Fractional overlap between adjacent passes (0.0 - 0.95)
    pub overlap: f64,
    /// Altitude assigned to every generated waypoint (meters)
    pub altitude_m: f64,
    /// Round off grid turns with an apex point between rows
    pub smooth_turns: bool,
    /// Number of perimeter laps
    pub perimeter_laps: u32,
    /// Per-lap shrink toward the centroid
    pub lap_shrink: f64,
    /// Hatch line angle, counter-clockwise from east (degrees)
    pub hatch_angle_deg: f64,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            base_spacing_m: DEFAULT_BASE_SPACING_M,
            overlap: DEFAULT_OVERLAP,
            altitude_m: DEFAULT_ALTITUDE_M,
            smooth_turns: false,
            perimeter_laps: 1,
            lap_shrink: DEFAULT_LAP_SHRINK,
            hatch_angle_deg: DEFAULT_HATCH_ANGLE_DEG,
        }
    }
}

impl PathParams {
    /// Distance between adjacent sweep lines:
    /// `base_spacing × (1 − overlap + 0.3)`, never below one meter.
    pub fn line_spacing_m(&self) -> f64 {
        let base = if self.base_spacing_m.is_finite() && self.base_spacing_m > 0.0 {
            self.base_spacing_m
        } else {
            DEFAULT_BASE_SPACING_M
        };
        let overlap = if self.overlap.is_finite() {
            self.overlap.clamp(0.0, MAX_OVERLAP)
        } else {
            DEFAULT_OVERLAP
        };
        (base * (1.0 - overlap + 0.3)).max(MIN_SPACING_M)
    }

    fn lap_shrink(&self) -> f64 {
        if self.lap_shrink.is_finite() {
            self.lap_shrink.clamp(0.0, 0.9)
        } else {
            DEFAULT_LAP_SHRINK
        }
    }

    fn hatch_angle_rad(&self) -> f64 {
        let deg = if self.hatch_angle_deg.is_finite() {
            self.hatch_angle_deg
        } else {
            DEFAULT_HATCH_ANGLE_DEG
        };
        deg.to_radians()
    }
}

/// Generate the ordered waypoint sequence for `area` using `pattern`.
///
/// Returns an empty path when the area has fewer than three distinct
/// vertices or contains non-finite coordinates.
pub fn generate(area: &SurveyArea, pattern: FlightPattern, params: &PathParams) -> FlightPath {
    if area.has_non_finite() || !params.altitude_m.is_finite() {
        return FlightPath::empty(pattern);
    }
    let vertices = area.vertices();
    if vertices.len() < 3 {
        return FlightPath::empty(pattern);
    }
    let Some(bbox) = BoundingBox::from_points(&vertices) else {
        return FlightPath::empty(pattern);
    };

    let spacing_m = params.line_spacing_m();
    let mut points = match pattern {
        FlightPattern::Grid => grid_sweep(&bbox, spacing_m, params.smooth_turns),
        FlightPattern::Crosshatch => crosshatch_sweep(&bbox, spacing_m, params.smooth_turns),
        FlightPattern::Perimeter => perimeter_laps(area, &vertices, params),
        FlightPattern::Hatch => hatch_lines(&bbox, spacing_m, params.hatch_angle_rad()),
        FlightPattern::Waypoint => vertices,
    };
    dedup_consecutive(&mut points);

    if points.iter().any(|p| !p.is_finite()) {
        tracing::warn!(%pattern, "path synthesis produced non-finite coordinates");
        return FlightPath::empty(pattern);
    }

    FlightPath::from_points(pattern, &points, params.altitude_m)
}

/// Evenly spaced positions from `min` upward, not exceeding `max`.
fn scan_positions(min: f64, max: f64, step: f64) -> Vec<f64> {
    let span = max - min;
    if !(step > 0.0) || !span.is_finite() || span <= 0.0 {
        return vec![min];
    }
    let mut step = step;
    let mut count = (span / step + 1e-9).floor() as usize;
    if count > MAX_SCAN_LINES {
        count = MAX_SCAN_LINES;
        step = span / count as f64;
    }
    (0..=count).map(|i| min + i as f64 * step).collect()
}

/// Move `from` toward `to` by `amount` (same units).
fn toward(from: f64, to: f64, amount: f64) -> f64 {
    if to >= from {
        from + amount
    } else {
        from - amount
    }
}

/// Boustrophedon sweep along lines of constant latitude, starting at the
/// south-west corner.
fn grid_sweep(bbox: &BoundingBox, spacing_m: f64, smooth: bool) -> Vec<GeoPoint> {
    let ref_lat = bbox.center().lat;
    let rows = scan_positions(bbox.min_lat, bbox.max_lat, meters_to_lat(spacing_m, ref_lat));
    let inset = if smooth {
        meters_to_lon(spacing_m / 2.0, ref_lat).min((bbox.max_lon - bbox.min_lon) / 4.0)
    } else {
        0.0
    };

    let mut points = Vec::with_capacity(rows.len() * 3);
    for (i, &lat) in rows.iter().enumerate() {
        let (edge_start, edge_end) = if i % 2 == 0 {
            (bbox.min_lon, bbox.max_lon)
        } else {
            (bbox.max_lon, bbox.min_lon)
        };
        let next_row = rows.get(i + 1).copied();

        let start = if smooth && i > 0 {
            toward(edge_start, edge_end, inset)
        } else {
            edge_start
        };
        let end = if smooth && next_row.is_some() {
            toward(edge_end, edge_start, inset)
        } else {
            edge_end
        };

        points.push(GeoPoint::new(lat, start));
        points.push(GeoPoint::new(lat, end));

        if let (true, Some(next_lat)) = (smooth, next_row) {
            points.push(GeoPoint::new((lat + next_lat) / 2.0, edge_end));
        }
    }
    points
}

/// Grid sweep followed by a north/south sweep over the same box.
fn crosshatch_sweep(bbox: &BoundingBox, spacing_m: f64, smooth: bool) -> Vec<GeoPoint> {
    let mut points = grid_sweep(bbox, spacing_m, smooth);
    let Some(last) = points.last().copied() else {
        return points;
    };

    let ref_lat = bbox.center().lat;
    let mut columns = scan_positions(bbox.min_lon, bbox.max_lon, meters_to_lon(spacing_m, ref_lat));
    // Begin the second pass on the side where the first one ended.
    if (bbox.max_lon - last.lon).abs() < (last.lon - bbox.min_lon).abs() {
        columns.reverse();
    }
    let start_north = (bbox.max_lat - last.lat).abs() < (last.lat - bbox.min_lat).abs();

    for (j, &lon) in columns.iter().enumerate() {
        let southward = (j % 2 == 0) == start_north;
        let (a, b) = if southward {
            (bbox.max_lat, bbox.min_lat)
        } else {
            (bbox.min_lat, bbox.max_lat)
        };
        points.push(GeoPoint::new(a, lon));
        points.push(GeoPoint::new(b, lon));
    }
    points
}

/// Walk the ring; each further lap is scaled toward the centroid.
fn perimeter_laps(area: &SurveyArea, vertices: &[GeoPoint], params: &PathParams) -> Vec<GeoPoint> {
    let Some(center) = area.centroid() else {
        return Vec::new();
    };
    let shrink = params.lap_shrink();
    let laps = params.perimeter_laps.clamp(1, MAX_PERIMETER_LAPS);

    let mut points = Vec::with_capacity((vertices.len() + 1) * laps as usize);
    for lap in 0..laps {
        let scale = 1.0 - shrink * lap as f64;
        if scale < MIN_LAP_SCALE {
            break;
        }
        let lap_start = points.len();
        for v in vertices {
            points.push(GeoPoint::new(
                center.lat + (v.lat - center.lat) * scale,
                center.lon + (v.lon - center.lon) * scale,
            ));
        }
        points.push(points[lap_start]);
    }
    points
}

/// Parallel lines at `angle_rad` clipped to the bounding box, alternating
/// direction between consecutive lines.
fn hatch_lines(bbox: &BoundingBox, spacing_m: f64, angle_rad: f64) -> Vec<GeoPoint> {
    const EPS: f64 = 1e-9;

    let frame = LocalFrame::new(bbox.min_lat, bbox.min_lon, bbox.center().lat);
    let (width, _) = frame.to_local(bbox.min_lat, bbox.max_lon);
    let (_, height) = frame.to_local(bbox.max_lat, bbox.min_lon);

    let dir = (angle_rad.cos(), angle_rad.sin());
    let normal = (-dir.1, dir.0);

    let corners = [(0.0, 0.0), (width, 0.0), (0.0, height), (width, height)];
    let offsets = corners.map(|(x, y)| x * normal.0 + y * normal.1);
    let c_min = offsets.iter().copied().fold(f64::INFINITY, f64::min);
    let c_max = offsets.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let first = c_min + spacing_m / 2.0;
    let lines = if first > c_max {
        vec![(c_min + c_max) / 2.0]
    } else {
        scan_positions(first, c_max, spacing_m)
    };

    let mut points = Vec::with_capacity(lines.len() * 2);
    let mut emitted = 0usize;
    for c in lines {
        let base = (c * normal.0, c * normal.1);
        let mut hits: Vec<f64> = Vec::with_capacity(4);

        // Intersections with x = 0 and x = width
        if dir.0.abs() > EPS {
            for x in [0.0, width] {
                let t = (x - base.0) / dir.0;
                let y = base.1 + t * dir.1;
                if y >= -EPS && y <= height + EPS {
                    hits.push(t);
                }
            }
        }
        // Intersections with y = 0 and y = height
        if dir.1.abs() > EPS {
            for y in [0.0, height] {
                let t = (y - base.1) / dir.1;
                let x = base.0 + t * dir.0;
                if x >= -EPS && x <= width + EPS {
                    hits.push(t);
                }
            }
        }

        let t_min = hits.iter().copied().fold(f64::INFINITY, f64::min);
        let t_max = hits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !t_min.is_finite() || !t_max.is_finite() || t_max - t_min < 1e-6 {
            continue;
        }

        let at = |t: f64| {
            let x = (base.0 + t * dir.0).clamp(0.0, width.max(0.0));
            let y = (base.1 + t * dir.1).clamp(0.0, height.max(0.0));
            let (lat, lon) = frame.to_geo(x, y);
            GeoPoint::new(
                lat.clamp(bbox.min_lat, bbox.max_lat),
                lon.clamp(bbox.min_lon, bbox.max_lon),
            )
        };

        let (a, b) = if emitted % 2 == 0 {
            (at(t_min), at(t_max))
        } else {
            (at(t_max), at(t_min))
        };
        points.push(a);
        points.push(b);
        emitted += 1;
    }
    points
}

fn dedup_consecutive(points: &mut Vec<GeoPoint>) {
    points.dedup_by(|b, a| (a.lat - b.lat).abs() < 1e-12 && (a.lon - b.lon).abs() < 1e-12);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{bearing_deg, haversine_distance, lat_to_meters, offset_position};

    const BASE_LAT: f64 = 33.0;
    const BASE_LON: f64 = -117.0;

    fn square_m(side_m: f64) -> SurveyArea {
        let (n_lat, _) = offset_position(BASE_LAT, BASE_LON, side_m, 0.0);
        let (_, e_lon) = offset_position(BASE_LAT, BASE_LON, 0.0, side_m);
        SurveyArea::from(vec![
            [BASE_LAT, BASE_LON],
            [BASE_LAT, e_lon],
            [n_lat, e_lon],
            [n_lat, BASE_LON],
            [BASE_LAT, BASE_LON],
        ])
    }

    fn triangle() -> SurveyArea {
        SurveyArea::from(vec![
            [BASE_LAT, BASE_LON],
            [BASE_LAT + 0.002, BASE_LON + 0.001],
            [BASE_LAT, BASE_LON + 0.003],
            [BASE_LAT, BASE_LON],
        ])
    }

    fn hexagon() -> SurveyArea {
        let ring: Vec<[f64; 2]> = (0..=6)
            .map(|i| {
                let angle = (i % 6) as f64 * 60.0;
                let (lat, lon) = crate::spatial::offset_by_bearing(
                    BASE_LAT,
                    BASE_LON,
                    300.0,
                    angle.to_radians(),
                );
                [lat, lon]
            })
            .collect();
        SurveyArea::from(ring)
    }

    #[test]
    fn every_pattern_stays_inside_the_bounding_box() {
        let params = PathParams {
            perimeter_laps: 3,
            smooth_turns: true,
            ..PathParams::default()
        };
        for area in [square_m(100.0), square_m(650.0), triangle(), hexagon()] {
            let bbox = area.bounding_box().unwrap();
            for pattern in FlightPattern::ALL {
                let path = generate(&area, pattern, &params);
                assert!(!path.is_empty(), "{pattern} produced nothing");
                for wp in &path.waypoints {
                    assert!(
                        bbox.contains(wp.lat, wp.lon, 1e-9),
                        "{pattern} waypoint {} outside bbox: ({}, {})",
                        wp.index,
                        wp.lat,
                        wp.lon
                    );
                }
            }
        }
    }

    #[test]
    fn grid_on_100m_square_starts_at_corner_with_expected_row_spacing() {
        let area = square_m(100.0);
        let bbox = area.bounding_box().unwrap();
        let params = PathParams {
            base_spacing_m: 40.0,
            overlap: 0.7,
            ..PathParams::default()
        };
        let path = generate(&area, FlightPattern::Grid, &params);

        let first = path.waypoints[0];
        assert_eq!((first.lat, first.lon), (bbox.min_lat, bbox.min_lon));

        let expected = 40.0 * 0.6;
        let row0 = path.waypoints[0];
        let row1 = path.waypoints[2];
        let local = lat_to_meters(row1.lat - row0.lat, bbox.center().lat);
        assert!((local - expected).abs() < 1e-6, "local spacing {local}");
        let geodesic = haversine_distance(row0.lat, row1.lon, row1.lat, row1.lon);
        assert!((geodesic - expected).abs() < 0.2, "geodesic spacing {geodesic}");

        // 0, 24, 48, 72, 96 m
        assert_eq!(path.len(), 10);
    }

    #[test]
    fn grid_rows_alternate_direction() {
        let path = generate(&square_m(200.0), FlightPattern::Grid, &PathParams::default());
        let wps = &path.waypoints;
        assert!(wps[1].lon > wps[0].lon, "first row heads east");
        assert!(wps[3].lon < wps[2].lon, "second row heads west");
        assert!(wps[5].lon > wps[4].lon, "third row heads east");
    }

    #[test]
    fn smoothing_adds_one_apex_per_turn() {
        let area = square_m(100.0);
        let plain = generate(&area, FlightPattern::Grid, &PathParams::default());
        let smooth = generate(
            &area,
            FlightPattern::Grid,
            &PathParams {
                smooth_turns: true,
                ..PathParams::default()
            },
        );
        let rows = plain.len() / 2;
        assert_eq!(smooth.len(), rows * 2 + rows - 1);
        assert_eq!(smooth.waypoints[0].lat, plain.waypoints[0].lat);
        assert_eq!(smooth.waypoints[0].lon, plain.waypoints[0].lon);
    }

    #[test]
    fn crosshatch_adds_an_orthogonal_pass() {
        let area = square_m(200.0);
        let grid = generate(&area, FlightPattern::Grid, &PathParams::default());
        let cross = generate(&area, FlightPattern::Crosshatch, &PathParams::default());
        assert!(cross.len() > grid.len());

        let second_pass = &cross.waypoints[grid.len()..];
        for leg in second_pass.chunks(2).filter(|c| c.len() == 2) {
            assert!((leg[0].lon - leg[1].lon).abs() < 1e-12, "columns hold longitude");
            assert!((leg[0].lat - leg[1].lat).abs() > 0.0);
        }
    }

    #[test]
    fn perimeter_laps_spiral_toward_the_centroid() {
        let area = square_m(300.0);
        let params = PathParams {
            perimeter_laps: 3,
            lap_shrink: 0.15,
            ..PathParams::default()
        };
        let path = generate(&area, FlightPattern::Perimeter, &params);
        assert_eq!(path.len(), 3 * 5);

        let center = area.centroid().unwrap();
        let d0 = path.waypoints[0].position().distance_to(&center);
        let d1 = path.waypoints[5].position().distance_to(&center);
        let d2 = path.waypoints[10].position().distance_to(&center);
        assert!((d1 / d0 - 0.85).abs() < 1e-3);
        assert!((d2 / d0 - 0.70).abs() < 1e-3);
    }

    #[test]
    fn perimeter_on_a_ten_meter_square_stays_inside_the_bounding_box() {
        let area = square_m(10.0);
        let bbox = area.bounding_box().unwrap();
        let params = PathParams {
            perimeter_laps: 3,
            ..PathParams::default()
        };
        let path = generate(&area, FlightPattern::Perimeter, &params);
        assert_eq!(path.len(), 3 * 5);
        for wp in &path.waypoints {
            assert!(
                bbox.contains(wp.lat, wp.lon, 1e-9),
                "waypoint {} outside bbox: ({}, {})",
                wp.index,
                wp.lat,
                wp.lon
            );
        }
    }

    #[test]
    fn perimeter_stops_before_collapsing() {
        let params = PathParams {
            perimeter_laps: 20,
            lap_shrink: 0.5,
            ..PathParams::default()
        };
        let path = generate(&square_m(300.0), FlightPattern::Perimeter, &params);
        assert_eq!(path.len(), 2 * 5);
    }

    #[test]
    fn hatch_lines_run_diagonally_and_alternate() {
        let path = generate(&square_m(300.0), FlightPattern::Hatch, &PathParams::default());
        assert!(path.len() >= 4);
        for (k, leg) in path.waypoints.chunks(2).enumerate() {
            if leg.len() < 2 || leg[0].position().distance_to(&leg[1].position()) < 5.0 {
                continue;
            }
            let heading = bearing_deg(leg[0].lat, leg[0].lon, leg[1].lat, leg[1].lon);
            let expected = if k % 2 == 0 { 45.0 } else { 225.0 };
            assert!((heading - expected).abs() < 1.0, "line {k} heading {heading}");
        }
    }

    #[test]
    fn waypoint_pattern_is_the_vertex_list() {
        let area = hexagon();
        let path = generate(&area, FlightPattern::Waypoint, &PathParams::default());
        assert_eq!(path.len(), 6);
        assert_eq!(path.waypoints[0].position(), area.vertices()[0]);
    }

    #[test]
    fn indices_are_sequential_and_altitude_applied() {
        let params = PathParams {
            altitude_m: 85.0,
            ..PathParams::default()
        };
        let path = generate(&hexagon(), FlightPattern::Crosshatch, &params);
        for (i, wp) in path.waypoints.iter().enumerate() {
            assert_eq!(wp.index, i);
            assert_eq!(wp.altitude_m, 85.0);
        }
    }

    #[test]
    fn unusable_areas_produce_empty_paths() {
        let two_points = SurveyArea::from(vec![[1.0, 1.0], [1.0, 2.0], [1.0, 1.0], [1.0, 1.0]]);
        let non_finite = SurveyArea::from(vec![
            [1.0, 1.0],
            [1.0, f64::NAN],
            [2.0, 2.0],
            [1.0, 1.0],
        ]);
        for pattern in FlightPattern::ALL {
            assert!(generate(&two_points, pattern, &PathParams::default()).is_empty());
            assert!(generate(&non_finite, pattern, &PathParams::default()).is_empty());
        }
    }

    #[test]
    fn tiny_spacing_is_capped() {
        let params = PathParams {
            base_spacing_m: 0.0001,
            overlap: 0.95,
            ..PathParams::default()
        };
        assert_eq!(params.line_spacing_m(), 1.0);
        let path = generate(&square_m(5_000.0), FlightPattern::Grid, &params);
        assert!(path.len() <= (MAX_SCAN_LINES + 1) * 2);
    }
}
