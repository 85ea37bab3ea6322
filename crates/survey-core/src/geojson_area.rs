//! GeoJSON ingestion boundary.
//!
//! GeoJSON positions are `[lon, lat]`; this is the only place they are
//! swapped into the crate-wide `[lat, lon]` order.

use geojson::{GeoJson, Geometry, Value};
use thiserror::Error;

use crate::models::{GeoPoint, SurveyArea};

#[derive(Debug, Error)]
pub enum AreaError {
    #[error("invalid GeoJSON: {0}")]
    GeoJson(String),
    #[error("GeoJSON contains no Polygon or MultiPolygon geometry")]
    NoPolygon,
    #[error("position {index} has fewer than two coordinates")]
    ShortPosition { index: usize },
}

/// Parse a survey area from GeoJSON text.
pub fn area_from_geojson_str(text: &str) -> Result<SurveyArea, AreaError> {
    let parsed: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| AreaError::GeoJson(e.to_string()))?;
    area_from_geojson(&parsed)
}

/// Parse a survey area from an already-decoded JSON value.
pub fn area_from_geojson_value(value: serde_json::Value) -> Result<SurveyArea, AreaError> {
    let parsed =
        GeoJson::from_json_value(value).map_err(|e| AreaError::GeoJson(e.to_string()))?;
    area_from_geojson(&parsed)
}

/// Take the outer ring of the first polygon found in a Geometry,
/// Feature or FeatureCollection.
pub fn area_from_geojson(geojson: &GeoJson) -> Result<SurveyArea, AreaError> {
    let geometry = match geojson {
        GeoJson::Geometry(geometry) => Some(geometry),
        GeoJson::Feature(feature) => feature.geometry.as_ref(),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .find(|g| is_polygonal(g)),
    };

    let outer = geometry
        .and_then(outer_ring)
        .ok_or(AreaError::NoPolygon)?;

    let mut points = Vec::with_capacity(outer.len());
    for (index, position) in outer.iter().enumerate() {
        match position.as_slice() {
            [lon, lat, ..] => points.push(GeoPoint::new(*lat, *lon)),
            _ => return Err(AreaError::ShortPosition { index }),
        }
    }

    Ok(SurveyArea::closed(points))
}

fn is_polygonal(geometry: &Geometry) -> bool {
    matches!(geometry.value, Value::Polygon(_) | Value::MultiPolygon(_))
}

fn outer_ring(geometry: &Geometry) -> Option<&Vec<Vec<f64>>> {
    match &geometry.value {
        Value::Polygon(rings) => rings.first(),
        Value::MultiPolygon(polygons) => polygons.first().and_then(|rings| rings.first()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_positions_are_swapped_to_lat_lon() {
        let text = r#"{
            "type": "Polygon",
            "coordinates": [[[-117.0, 33.0], [-116.99, 33.0], [-116.99, 33.01], [-117.0, 33.0]]]
        }"#;
        let area = area_from_geojson_str(text).unwrap();
        assert_eq!(area.ring()[1], GeoPoint::new(33.0, -116.99));
        assert!(area.is_valid());
    }

    #[test]
    fn feature_without_closing_vertex_is_closed() {
        let value = serde_json::json!({
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[10.0, 50.0], [10.01, 50.0], [10.01, 50.01], [10.0, 50.01]]]
            }
        });
        let area = area_from_geojson_value(value).unwrap();
        assert_eq!(area.ring().len(), 5);
        assert_eq!(area.ring().first(), area.ring().last());
    }

    #[test]
    fn collection_of_points_has_no_polygon() {
        let value = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Point", "coordinates": [10.0, 50.0] }
            }]
        });
        assert!(matches!(area_from_geojson_value(value), Err(AreaError::NoPolygon)));
    }
}
