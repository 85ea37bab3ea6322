//! Reading survey areas and missions from files.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use survey_core::{area_from_geojson_value, MissionDescriptor, SurveyArea};

/// Parse an area from JSON: a GeoJSON object or a `[[lat, lon], ...]` ring.
pub fn parse_area(value: Value) -> Result<SurveyArea> {
    let area = if value.is_object() {
        area_from_geojson_value(value)?
    } else {
        serde_json::from_value(value).context("Area must be a [[lat, lon], ...] array")?
    };
    let errors = area.validate();
    if !errors.is_empty() {
        bail!("Invalid survey area: {}", errors.join("; "));
    }
    Ok(area)
}

pub fn load_area(path: impl AsRef<Path>) -> Result<SurveyArea> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    parse_area(value)
}

/// Load a mission descriptor. The `area` field may be GeoJSON.
pub fn load_mission(path: impl AsRef<Path>) -> Result<MissionDescriptor> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    if let Some(area) = value.get_mut("area") {
        if area.is_object() {
            let parsed = area_from_geojson_value(area.take())?;
            *area = serde_json::to_value(parsed)?;
        }
    }
    serde_json::from_value(value).with_context(|| format!("{} is not a mission", path.display()))
}
